//! Per-request admission orchestration.
//!
//! Resolves the request's durations, runs it through the gate and turns
//! the gate outcome into what the routing layer needs: an admitted query
//! with its budget, a 503-worthy error, or nothing at all for a client
//! that went away.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::admission::duration::{self, QueryBudget};
use crate::admission::error::AdmissionError;
use crate::admission::gate::{AdmissionGate, AdmissionOutcome, Slot};
use crate::config::GateConfig;

/// Who is asking. Only used for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub request_id: String,
    pub remote_addr: Option<SocketAddr>,
    pub request_uri: String,
}

/// A request waiting for admission.
#[derive(Debug)]
pub struct PendingWait {
    arrival: Instant,
    requested_timeout: Option<String>,
    cancel: CancellationToken,
    identity: RequestIdentity,
}

impl PendingWait {
    /// Start the wait clock now.
    ///
    /// `cancel` belongs to the inbound request; the gate only listens to it.
    pub fn new(requested_timeout: Option<String>, cancel: CancellationToken, identity: RequestIdentity) -> Self {
        Self {
            arrival: Instant::now(),
            requested_timeout,
            cancel,
            identity,
        }
    }
}

/// A query that holds a slot and may now execute.
#[derive(Debug)]
pub struct AdmittedQuery {
    pub slot: Slot,
    pub budget: QueryBudget,
    pub cancel: CancellationToken,
}

/// Non-error admission results.
#[derive(Debug)]
pub enum Admission {
    Admitted(AdmittedQuery),
    /// The client went away while queued. No response is due.
    Abandoned,
}

/// Entry point used by the routing layer.
#[derive(Debug)]
pub struct AdmissionController {
    gate: AdmissionGate,
    config: GateConfig,
}

impl AdmissionController {
    pub fn new(config: GateConfig) -> Self {
        Self {
            gate: AdmissionGate::new(config.capacity),
            config,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Wait for a slot for `wait`.
    pub async fn admit(&self, wait: PendingWait) -> Result<Admission, AdmissionError> {
        let durations = duration::resolve(wait.requested_timeout.as_deref(), &self.config);

        match self.gate.acquire(durations.queue_deadline, &wait.cancel).await {
            AdmissionOutcome::Admitted(slot) => {
                if !slot.waited().is_zero() {
                    tracing::debug!(
                        request_id = %wait.identity.request_id,
                        waited_ms = slot.waited().as_millis() as u64,
                        "Request admitted after queueing"
                    );
                }
                Ok(Admission::Admitted(AdmittedQuery {
                    slot,
                    budget: QueryBudget::new(wait.arrival, durations.query),
                    cancel: wait.cancel,
                }))
            }
            AdmissionOutcome::Abandoned { .. } => {
                tracing::info!(
                    request_id = %wait.identity.request_id,
                    remote_addr = %display_addr(wait.identity.remote_addr),
                    request_uri = ?wait.identity.request_uri,
                    "client has cancelled the request after {:.3} seconds",
                    wait.arrival.elapsed().as_secs_f64()
                );
                Ok(Admission::Abandoned)
            }
            AdmissionOutcome::RejectedTimeout { deadline } => {
                let err = self.queue_timeout(deadline);
                tracing::warn!(
                    request_id = %wait.identity.request_id,
                    remote_addr = %display_addr(wait.identity.remote_addr),
                    request_uri = ?wait.identity.request_uri,
                    error = %err,
                    "Request rejected by admission gate"
                );
                Err(err)
            }
        }
    }

    /// Admit `wait`, then run `execute` while holding the slot.
    ///
    /// Returns `Ok(None)` when the client abandoned the wait. The slot is
    /// released once `execute` finishes, whatever it returns, and also if
    /// it panics or this future is dropped mid-execution.
    pub async fn run<F, Fut, T>(&self, wait: PendingWait, execute: F) -> Result<Option<T>, AdmissionError>
    where
        F: FnOnce(QueryBudget, CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.admit(wait).await? {
            Admission::Admitted(AdmittedQuery { slot, budget, cancel }) => {
                let output = execute(budget, cancel).await;
                slot.release();
                Ok(Some(output))
            }
            Admission::Abandoned => Ok(None),
        }
    }

    fn queue_timeout(&self, waited: Duration) -> AdmissionError {
        AdmissionError::QueueTimeout {
            waited,
            capacity: self.gate.capacity(),
            max_queue_duration: self.config.max_queue_duration,
        }
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
}
