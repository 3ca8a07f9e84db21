//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound query request
//!     → controller.rs (one PendingWait per request)
//!     → duration.rs (effective query duration, queue deadline)
//!     → gate.rs (fast path claim, or bounded wait)
//!         → timer_pool.rs (leased deadline timer, slow path only)
//!     → Admitted: Slot held while the executor runs
//!     → RejectedTimeout: 503 with remediation hints
//!     → Abandoned: logged, no response
//! ```
//!
//! # Design Decisions
//! - The gate is built once from `GateConfig` and shared by reference
//! - Slots are RAII guards; release happens on drop, on every exit path
//! - Waiters race slot, deadline and cancellation; exactly one wins
//! - No FIFO guarantee among waiters

pub mod controller;
pub mod duration;
pub mod error;
pub mod gate;
pub mod timer_pool;

pub use controller::{Admission, AdmissionController, AdmittedQuery, PendingWait, RequestIdentity};
pub use duration::{QueryBudget, ResolvedDurations};
pub use error::AdmissionError;
pub use gate::{AdmissionGate, AdmissionOutcome, GateStats, Slot};
pub use timer_pool::{TimerHandle, TimerPool};
