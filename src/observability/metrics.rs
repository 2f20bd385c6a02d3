//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define edge metrics (requests, latency, rejections, whitelist refills)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `edge_requests_total` (counter): by method, status, target
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_rejections_total` (counter): by pipeline stage
//! - `edge_whitelist_fetches_total` (counter): by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels stay low-cardinality (no client IPs)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, target: &str, start: Instant) {
    counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by a pipeline stage.
pub fn record_rejection(stage: &'static str) {
    counter!("edge_rejections_total", "stage" => stage).increment(1);
}

/// Record a whitelist refill attempt.
pub fn record_whitelist_fetch(outcome: &'static str) {
    counter!("edge_whitelist_fetches_total", "outcome" => outcome).increment(1);
}
