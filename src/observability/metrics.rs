//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (attempts, dispatch outcomes, latency, health)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gateway_attempts_total` (counter): attempts by target, outcome
//! - `gateway_dispatch_total` (counter): client requests by final outcome
//! - `gateway_dispatch_duration_seconds` (histogram): time to response headers or terminal error
//! - `gateway_target_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Outcome labels are error codes, keeping label cardinality bounded

use std::net::SocketAddr;
use tokio::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One attempt against one target. `outcome` is `success` or an error code.
pub fn record_attempt(target: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_attempts_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Final outcome of a client request.
pub fn record_dispatch(outcome: &'static str, started: Instant) {
    metrics::counter!("gateway_dispatch_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_dispatch_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_target_health(target: &str, healthy: bool) {
    metrics::gauge!("gateway_target_health", "target" => target.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
