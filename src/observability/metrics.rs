//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vl_concurrent_select_limit_reached_total` (counter): requests that had to queue
//! - `vl_concurrent_select_limit_timeout_total` (counter): queued requests rejected at their deadline
//! - `vl_concurrent_select_capacity` (gauge): configured slot count
//! - `vl_concurrent_select_current` (gauge): slots currently held
//! - `vl_http_requests_total{path}` (counter): requests reaching a query path
//!
//! # Design Decisions
//! - Names match the query node's own metrics so dashboards keep working
//! - Updates go through the `metrics` facade; without an installed recorder they are no-ops

use std::net::SocketAddr;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const LIMIT_REACHED_TOTAL: &str = "vl_concurrent_select_limit_reached_total";
pub const LIMIT_TIMEOUT_TOTAL: &str = "vl_concurrent_select_limit_timeout_total";
pub const CAPACITY: &str = "vl_concurrent_select_capacity";
pub const CURRENT: &str = "vl_concurrent_select_current";
pub const HTTP_REQUESTS_TOTAL: &str = "vl_http_requests_total";

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime, before the admission gate
/// is built so its capacity gauge lands in the registry.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        LIMIT_REACHED_TOTAL,
        "Search requests that found every slot busy and had to queue"
    );
    describe_counter!(
        LIMIT_TIMEOUT_TOTAL,
        "Queued search requests rejected because no slot freed up in time"
    );
    describe_gauge!(CAPACITY, "Maximum number of concurrently executing search requests");
    describe_gauge!(CURRENT, "Search requests currently executing");
    describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests by path");
}

pub fn record_limit_reached() {
    counter!(LIMIT_REACHED_TOTAL).increment(1);
}

pub fn record_limit_timeout() {
    counter!(LIMIT_TIMEOUT_TOTAL).increment(1);
}

/// Publish the slot pool size; no slot is held yet.
pub fn init_slot_gauges(capacity: usize) {
    gauge!(CAPACITY).set(capacity as f64);
    gauge!(CURRENT).set(0.0);
}

// Relative updates commute, so concurrent claims and releases cannot leave
// a stale absolute value behind.
pub fn slot_claimed() {
    gauge!(CURRENT).increment(1.0);
}

pub fn slot_released() {
    gauge!(CURRENT).decrement(1.0);
}

pub fn record_http_request(path: &'static str) {
    counter!(HTTP_REQUESTS_TOTAL, "path" => path).increment(1);
}
