//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by outcome and status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_admission_rejections_total` (counter): 429s
//! - `proxy_auth_failures_total` (counter): 401s
//! - `proxy_upstream_errors_total` (counter): 502s by reason
//! - `proxy_in_flight_requests` (gauge): admission slots currently held
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Counter a rejection with the given reason is recorded under.
pub fn rejection_counter(reason: &str) -> &'static str {
    match reason {
        "capacity_exceeded" => "proxy_admission_rejections_total",
        "unauthenticated" => "proxy_auth_failures_total",
        _ => "proxy_upstream_errors_total",
    }
}

/// Record a request turned away by the pipeline.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!(rejection_counter(reason), "reason" => reason).increment(1);
}

pub fn slot_acquired() {
    metrics::gauge!("proxy_in_flight_requests").increment(1.0);
}

pub fn slot_released() {
    metrics::gauge!("proxy_in_flight_requests").decrement(1.0);
}
