//! Bounded-concurrency admission gate.
//!
//! # Responsibilities
//! - Hold exactly `capacity` interchangeable slots
//! - Claim a slot immediately when one is free (no timer involved)
//! - Otherwise wait for the first of: slot freed, deadline, cancellation
//! - Maintain the limit-reached / limit-timeout counters and slot gauges
//!
//! # Invariants
//! - `0 <= slots_held <= capacity` at every instant
//! - Each `Admitted` outcome owns exactly one `Slot`; dropping it releases the slot
//! - `Abandoned` and `RejectedTimeout` never hold a slot
//! - The leased timer is returned on every path out of the slow path
//!
//! # Design Decisions
//! - Slot accounting lives in a `tokio::sync::Semaphore`; no coarse lock
//! - The race is a `tokio::select!` without `biased`, so no branch is preferred
//! - Waiter ordering is not part of the contract

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::admission::timer_pool::TimerPool;
use crate::observability::metrics;

/// Result of a single `AdmissionGate::acquire` call.
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// A slot was claimed and is owned by the caller.
    Admitted(Slot),
    /// The caller's cancellation fired while queued.
    Abandoned { waited: Duration },
    /// No slot became free within the queue deadline.
    RejectedTimeout { deadline: Duration },
}

/// Gate counters. Updated atomically, independent of slot accounting.
#[derive(Debug, Default)]
pub struct GateStats {
    limit_reached: AtomicU64,
    limit_timeout: AtomicU64,
    held: AtomicUsize,
}

impl GateStats {
    /// Times the fast path failed and a request had to queue.
    pub fn limit_reached(&self) -> u64 {
        self.limit_reached.load(Ordering::Relaxed)
    }

    /// Times a queued request gave up at its deadline.
    pub fn limit_timeout(&self) -> u64 {
        self.limit_timeout.load(Ordering::Relaxed)
    }

    /// Slots currently held.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }
}

/// The bounded slot pool shared by all request workers.
#[derive(Debug)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
    timers: TimerPool,
    stats: Arc<GateStats>,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        metrics::init_slot_gauges(capacity);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            timers: TimerPool::default(),
            stats: Arc::new(GateStats::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slots_held(&self) -> usize {
        self.stats.held()
    }

    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    pub fn timers(&self) -> &TimerPool {
        &self.timers
    }

    /// Claim a slot, waiting at most `queue_deadline` and giving up as soon
    /// as `cancel` fires.
    pub async fn acquire(&self, queue_deadline: Duration, cancel: &CancellationToken) -> AdmissionOutcome {
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return AdmissionOutcome::Admitted(self.claim(permit, Duration::ZERO));
        }

        self.stats.limit_reached.fetch_add(1, Ordering::Relaxed);
        metrics::record_limit_reached();

        let started = Instant::now();
        let mut timer = self.timers.lease(queue_deadline);

        tracing::debug!(
            capacity = self.capacity,
            queue_deadline_ms = queue_deadline.as_millis() as u64,
            "Concurrency limit reached, queueing request"
        );

        // Losing branches are dropped here: a pending semaphore acquire gives
        // up its place without taking a permit.
        tokio::select! {
            permit = self.slots.clone().acquire_owned() => match permit {
                Ok(permit) => AdmissionOutcome::Admitted(self.claim(permit, started.elapsed())),
                // The semaphore is never closed; treat it like a vanished caller.
                Err(_) => AdmissionOutcome::Abandoned { waited: started.elapsed() },
            },
            _ = cancel.cancelled() => AdmissionOutcome::Abandoned { waited: started.elapsed() },
            _ = &mut timer => {
                self.stats.limit_timeout.fetch_add(1, Ordering::Relaxed);
                metrics::record_limit_timeout();
                AdmissionOutcome::RejectedTimeout { deadline: queue_deadline }
            }
        }
    }

    fn claim(&self, permit: OwnedSemaphorePermit, waited: Duration) -> Slot {
        self.stats.held.fetch_add(1, Ordering::AcqRel);
        metrics::slot_claimed();
        Slot {
            _permit: permit,
            stats: Arc::clone(&self.stats),
            waited,
        }
    }
}

/// One held unit of query concurrency.
///
/// Released exactly once: explicitly via `release`, or when dropped
/// (including during unwinding).
#[derive(Debug)]
#[must_use = "dropping a Slot releases it immediately"]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<GateStats>,
    waited: Duration,
}

impl Slot {
    /// Time spent queued before this slot was claimed.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Return the slot to the gate.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so `held` never exceeds
        // the number of permits actually taken.
        self.stats.held.fetch_sub(1, Ordering::AcqRel);
        metrics::slot_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::testing::{run_recorded, sample};
    use crate::observability::metrics::CURRENT;

    fn admitted(outcome: AdmissionOutcome) -> Slot {
        match outcome {
            AdmissionOutcome::Admitted(slot) => slot,
            other => panic!("expected Admitted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_path_leases_no_timer() {
        let gate = AdmissionGate::new(2);
        let cancel = CancellationToken::new();

        let a = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);
        let b = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);

        assert_eq!(a.waited(), Duration::ZERO);
        assert_eq!(b.waited(), Duration::ZERO);
        assert_eq!(gate.slots_held(), 2);
        assert_eq!(gate.stats().limit_reached(), 0);
        assert_eq!(gate.timers().idle(), 0);
        assert_eq!(gate.timers().leased(), 0);

        a.release();
        assert_eq!(gate.slots_held(), 1);
        drop(b);
        assert_eq!(gate.slots_held(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_request_admitted_when_slot_frees() {
        let gate = Arc::new(AdmissionGate::new(2));
        let cancel = CancellationToken::new();

        let first = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);
        let _second = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let slot = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);
                slot.waited()
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        first.release();

        let waited = waiter.await.unwrap();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_millis(1100));
        assert_eq!(gate.stats().limit_reached(), 1);
        assert_eq!(gate.stats().limit_timeout(), 0);
        assert_eq!(gate.timers().leased(), 0);
        assert_eq!(gate.slots_held(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_request_times_out_at_deadline() {
        let gate = AdmissionGate::new(1);
        let cancel = CancellationToken::new();
        let _held = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);

        let start = Instant::now();
        let outcome = gate.acquire(Duration::from_secs(5), &cancel).await;
        let elapsed = start.elapsed();

        match outcome {
            AdmissionOutcome::RejectedTimeout { deadline } => {
                assert_eq!(deadline, Duration::from_secs(5))
            }
            other => panic!("expected RejectedTimeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_millis(5010));
        assert_eq!(gate.stats().limit_timeout(), 1);
        assert_eq!(gate.slots_held(), 1);
        assert_eq!(gate.timers().leased(), 0);
        assert_eq!(gate.timers().idle(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_never_claims_slot() {
        let gate = Arc::new(AdmissionGate::new(1));
        let owner = CancellationToken::new();
        let held = admitted(gate.acquire(Duration::from_secs(10), &owner).await);

        let client = CancellationToken::new();
        let waiter = {
            let gate = Arc::clone(&gate);
            let client = client.clone();
            tokio::spawn(async move { gate.acquire(Duration::from_secs(10), &client).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        client.cancel();
        let outcome = waiter.await.unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        held.release();

        match outcome {
            AdmissionOutcome::Abandoned { waited } => {
                assert!(waited >= Duration::from_secs(2));
            }
            other => panic!("expected Abandoned, got {other:?}"),
        }
        assert_eq!(gate.slots_held(), 0);
        assert_eq!(gate.stats().limit_reached(), 1);
        assert_eq!(gate.stats().limit_timeout(), 0);
        assert_eq!(gate.timers().leased(), 0);

        // The freed slot is still available to a newcomer.
        let again = admitted(gate.acquire(Duration::from_secs(1), &owner).await);
        assert_eq!(again.waited(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_is_reused_across_waits() {
        let gate = AdmissionGate::new(1);
        let cancel = CancellationToken::new();
        let _held = admitted(gate.acquire(Duration::from_secs(10), &cancel).await);

        for _ in 0..3 {
            let outcome = gate.acquire(Duration::from_millis(100), &cancel).await;
            assert!(matches!(outcome, AdmissionOutcome::RejectedTimeout { .. }));
        }
        assert_eq!(gate.stats().limit_timeout(), 3);
        assert_eq!(gate.timers().idle(), 1);
        assert_eq!(gate.timers().leased(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn capacity_never_exceeded_under_contention() {
        let capacity = 3;
        let gate = Arc::new(AdmissionGate::new(capacity));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..32)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let cancel = CancellationToken::new();
                    let outcome = gate.acquire(Duration::from_secs(30), &cancel).await;
                    let slot = admitted(outcome);
                    let held = gate.slots_held();
                    peak.fetch_max(held, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    slot.release();
                })
            })
            .collect();

        for worker in workers {
            worker.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= capacity);
        assert_eq!(gate.slots_held(), 0);
        assert_eq!(gate.stats().limit_timeout(), 0);
        assert_eq!(gate.timers().leased(), 0);
    }

    #[test]
    fn slot_gauge_matches_slots_held() {
        let ((kept, held), rendered) = run_recorded(async {
            let gate = Arc::new(AdmissionGate::new(3));
            let kept = admitted(gate.acquire(Duration::from_secs(1), &CancellationToken::new()).await);

            let workers: Vec<_> = (0..16)
                .map(|_| {
                    let gate = Arc::clone(&gate);
                    tokio::spawn(async move {
                        let cancel = CancellationToken::new();
                        let slot = admitted(gate.acquire(Duration::from_secs(30), &cancel).await);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        drop(slot);
                    })
                })
                .collect();
            for worker in workers {
                worker.await.unwrap();
            }

            let held = gate.slots_held();
            (kept, held)
        });

        assert_eq!(held, 1);
        assert_eq!(sample(&rendered, CURRENT), Some(1.0));
        drop(kept);
    }
}
