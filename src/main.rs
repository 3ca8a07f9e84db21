//! Query gate
//!
//! Admission control in front of a log query node.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 QUERY GATE                   │
//!                         │                                              │
//!     Client Request      │  ┌─────────┐    ┌────────────┐    ┌───────┐  │
//!     ────────────────────┼─▶│  http   │───▶│ admission  │───▶│ gate  │  │
//!                         │  │ server  │    │ controller │    │ slots │  │
//!                         │  └─────────┘    └─────┬──────┘    └───────┘  │
//!                         │                       │ admitted             │
//!                         │                       ▼                      │
//!     Client Response     │                ┌────────────┐                │
//!     ◀───────────────────┼────────────────│   query    │◀───────────────┼──── Query node
//!                         │                │  executor  │                │
//!                         │                └────────────┘                │
//!                         └──────────────────────────────────────────────┘
//! ```

use clap::Parser;

use query_gate::config::CliArgs;
use query_gate::lifecycle::{signals, startup, Shutdown};
use query_gate::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let config = cli.load()?;

    logging::init_logging(&config.observability);
    tracing::info!("query-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
