//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rate_limited_total` (counter): rejected requests by reason
//! - `gateway_rate_limit_store_errors_total` (counter): fail-open events
//! - `gateway_upstream_retries_total` (counter): retries by service
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! deployments without `metrics_enabled` pay almost nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "service" => service.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status,
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    metrics::counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_rate_limit_store_error() {
    metrics::counter!("gateway_rate_limit_store_errors_total").increment(1);
}

pub fn record_upstream_retry(service: &str) {
    metrics::counter!("gateway_upstream_retries_total", "service" => service.to_string()).increment(1);
}
