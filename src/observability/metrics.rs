//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, auth outcomes, proxy traffic)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_auth_decisions_total` (counter): auth outcomes
//! - `gateway_proxy_bytes_total` (counter): proxied body bytes by direction
//! - `gateway_proxy_sessions_aborted_total` (counter): torn-down proxy sessions
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording without an installed recorder is a no-op, so tests need no setup

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_auth_decision(outcome: &'static str) {
    ::metrics::counter!("gateway_auth_decisions_total", "outcome" => outcome).increment(1);
}

/// `direction` is `upstream` (client to upstream) or `downstream`.
pub fn record_proxy_bytes(direction: &'static str, bytes: u64) {
    if bytes > 0 {
        ::metrics::counter!("gateway_proxy_bytes_total", "direction" => direction).increment(bytes);
    }
}

pub fn record_session_aborted() {
    ::metrics::counter!("gateway_proxy_sessions_aborted_total").increment(1);
}
