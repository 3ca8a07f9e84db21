//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics recorder before anything records
//! - Resolve admission limits and build the controller
//! - Bind the listener last, so traffic only arrives when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use axum::http::uri::InvalidUri;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admission::AdmissionController;
use crate::config::gate::available_cpus;
use crate::config::{AppConfig, GateConfig};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::query::UpstreamExecutor;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("cannot install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("invalid upstream address: {0}")]
    Upstream(#[from] InvalidUri),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(std::io::Error),
}

/// Start every subsystem and serve until `shutdown` is triggered.
pub async fn run(config: AppConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let gate_config = GateConfig::resolve(&config.search, available_cpus());
    tracing::info!(
        capacity = gate_config.capacity,
        max_queue_duration_ms = gate_config.max_queue_duration.as_millis() as u64,
        max_query_duration_ms = gate_config.max_query_duration.as_millis() as u64,
        "Admission limits resolved"
    );
    let controller = Arc::new(AdmissionController::new(gate_config));

    let executor = Arc::new(UpstreamExecutor::new(&config.upstream)?);
    tracing::info!(endpoint = %executor.endpoint(), "Forwarding admitted queries");

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    HttpServer::new(controller, executor, shutdown.token())
        .run(listener)
        .await
        .map_err(StartupError::Serve)
}
