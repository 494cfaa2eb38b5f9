//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status
//! - `dispatch_request_duration_seconds` (histogram): dispatch latency
//! - `dispatch_faults_total` (counter): normalized faults by status
//! - `dispatch_resolution_cache_total` (counter): cache hits and misses
//! - `dispatch_active_connections` (gauge): open connections
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        "dispatch_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("dispatch_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_fault(status: u16) {
    metrics::counter!("dispatch_faults_total", "status" => status.to_string()).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("dispatch_resolution_cache_total", "result" => result).increment(1);
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("dispatch_active_connections").set(count as f64);
}
