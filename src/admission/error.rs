//! Client-visible admission failures.

use std::time::Duration;
use thiserror::Error;

/// The only admission condition that reaches the client.
///
/// Cancellation is not an error (nobody is left to receive it) and a
/// malformed `timeout` silently falls back to the server ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No slot became free within the queue deadline.
    #[error(
        "couldn't start executing the request in {:.3} seconds, since -search.maxConcurrentRequests={capacity} concurrent requests are executed. \
         Possible solutions: to reduce query load; to add more compute resources to the server; \
         to increase -search.maxQueueDuration={:?}; to increase -search.maxQueryDuration; to increase -search.maxConcurrentRequests",
        .waited.as_secs_f64(),
        .max_queue_duration
    )]
    QueueTimeout {
        /// Queue deadline the request actually waited.
        waited: Duration,
        /// Configured number of slots.
        capacity: usize,
        /// Configured queue policy.
        max_queue_duration: Duration,
    },
}
