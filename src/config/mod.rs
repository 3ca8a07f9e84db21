//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flag overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → gate.rs (GateConfig with derived capacity)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changing limits requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod gate;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::CliArgs;
pub use gate::GateConfig;
pub use schema::AppConfig;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::SearchConfig;
pub use schema::UpstreamConfig;
