//! Admission gate for a log query endpoint.
//!
//! Bounds the number of concurrently executing queries, queues the excess
//! for a limited time, and rejects or abandons requests when the queue
//! deadline passes or the client goes away.

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod query;

pub use admission::{AdmissionController, AdmissionGate};
pub use config::{AppConfig, GateConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
