//! Query and queue duration arithmetic.
//!
//! # Responsibilities
//! - Parse the client `timeout` parameter
//! - Cap it against `max_query_duration`
//! - Derive the queue deadline from the effective query duration
//!
//! # Design Decisions
//! - Never fails: malformed input means "use the server ceiling"
//! - A bare integer is milliseconds; suffixed values (`1.5s`, `1m30s`) are durations

use std::time::Duration;
use tokio::time::Instant;

use crate::config::GateConfig;

/// Durations derived for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDurations {
    /// Time budget for query execution, counted from arrival.
    pub query: Duration,
    /// Maximum time the request may wait for a slot.
    pub queue_deadline: Duration,
}

/// Resolve both durations for a request carrying `requested_timeout`.
pub fn resolve(requested_timeout: Option<&str>, config: &GateConfig) -> ResolvedDurations {
    let query = effective_query_duration(requested_timeout, config);
    ResolvedDurations {
        query,
        queue_deadline: queue_deadline(query, config),
    }
}

/// Effective query duration: the requested value when it is positive and
/// within `max_query_duration`, otherwise `max_query_duration`.
pub fn effective_query_duration(requested_timeout: Option<&str>, config: &GateConfig) -> Duration {
    match requested_timeout.and_then(parse_duration) {
        Some(d) if d <= config.max_query_duration => d,
        _ => config.max_query_duration,
    }
}

/// A request never queues longer than it may run, nor longer than the queue policy.
pub fn queue_deadline(effective_query_duration: Duration, config: &GateConfig) -> Duration {
    effective_query_duration.min(config.max_queue_duration)
}

/// Parse a positive duration.
///
/// Returns `None` for empty, zero, negative or malformed input.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ms) = raw.parse::<i64>() {
        return u64::try_from(ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
    }

    let mut secs = 0f64;
    let mut rest = raw;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        secs += value * scale;
        rest = &rest[unit_len..];
    }

    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Execution budget handed to the query executor after admission.
///
/// Time spent queued is charged against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBudget {
    arrival: Instant,
    effective: Duration,
}

impl QueryBudget {
    pub fn new(arrival: Instant, effective: Duration) -> Self {
        Self { arrival, effective }
    }

    /// The full effective query duration.
    pub fn effective(&self) -> Duration {
        self.effective
    }

    /// Instant after which the query must not keep running.
    pub fn deadline(&self) -> Instant {
        self.arrival + self.effective
    }

    /// Budget left right now; zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.effective.saturating_sub(self.arrival.elapsed())
    }
}
