//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, durations > 0)
//! - Validate addresses before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    InvalidMetricsAddress(String),

    #[error("search.max_concurrent_requests must be greater than zero")]
    ZeroCapacity,

    #[error("search.{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("upstream.address {0:?} is not a valid host:port")]
    InvalidUpstreamAddress(String),

    #[error("upstream.max_response_bytes must be greater than zero")]
    ZeroResponseLimit,
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.search.max_concurrent_requests == Some(0) {
        errors.push(ValidationError::ZeroCapacity);
    }
    if config.search.max_queue_duration_ms == 0 {
        errors.push(ValidationError::ZeroDuration("max_queue_duration_ms"));
    }
    if config.search.max_query_duration_ms == 0 {
        errors.push(ValidationError::ZeroDuration("max_query_duration_ms"));
    }

    let upstream_ok = config
        .upstream
        .address
        .parse::<Authority>()
        .map(|authority| authority.port_u16().is_some())
        .unwrap_or(false);
    if !upstream_ok {
        errors.push(ValidationError::InvalidUpstreamAddress(
            config.upstream.address.clone(),
        ));
    }
    if config.upstream.max_response_bytes == 0 {
        errors.push(ValidationError::ZeroResponseLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
