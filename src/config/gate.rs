//! Resolved admission limits.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::schema::SearchConfig;

/// Upper bound for the derived default capacity.
///
/// A single query can saturate every CPU core, so more concurrent queries
/// only contend for CPU time.
pub const MAX_DEFAULT_CAPACITY: usize = 16;

/// Immutable admission limits, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Number of slots.
    pub capacity: usize,
    /// Longest a request may wait for a slot.
    pub max_queue_duration: Duration,
    /// Ceiling for query execution time.
    pub max_query_duration: Duration,
}

impl GateConfig {
    /// Resolve limits from config, deriving capacity from `available_cpus` when unset.
    pub fn resolve(search: &SearchConfig, available_cpus: usize) -> Self {
        Self {
            capacity: search
                .max_concurrent_requests
                .unwrap_or_else(|| default_capacity(available_cpus)),
            max_queue_duration: Duration::from_millis(search.max_queue_duration_ms),
            max_query_duration: Duration::from_millis(search.max_query_duration_ms),
        }
    }
}

/// Default slot count: twice the CPUs on small machines, one per CPU
/// otherwise, capped at `MAX_DEFAULT_CAPACITY`.
pub fn default_capacity(available_cpus: usize) -> usize {
    let n = available_cpus.max(1);
    let n = if n <= 4 { n * 2 } else { n };
    n.min(MAX_DEFAULT_CAPACITY)
}

/// CPUs available to this process. Respects cgroup quotas on Linux.
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
