//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! admission gate, HTTP handlers
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every admission log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
