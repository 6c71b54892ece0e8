//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejections by key kind
//! - `gateway_auth_failures_total` (counter): failures by error kind
//! - `gateway_in_flight_requests` (gauge): requests currently in the pipeline

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorKind;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter");
            false
        }
    }
}

pub fn record_request(method: &str, route: &'static str, status: u16, elapsed: Duration) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(elapsed.as_secs_f64());
}

pub fn record_rate_limited(key_kind: &'static str) {
    ::metrics::counter!("gateway_rate_limited_total", "key" => key_kind).increment(1);
}

pub fn record_auth_failure(kind: ErrorKind) {
    ::metrics::counter!("gateway_auth_failures_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_in_flight(count: usize) {
    ::metrics::gauge!("gateway_in_flight_requests").set(count as f64);
}
