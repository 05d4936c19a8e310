//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): gate outcomes by `decision`
//! - `gate_rate_limited_total` (counter): 429 responses
//! - `gate_session_lookup_errors_total` (counter): identity provider failures
//! - `gate_upstream_responses_total` (counter): forwarded responses by `status`
//! - `gate_upstream_duration_seconds` (histogram): upstream latency
//! - `verification_events_total` (counter): verification API outcomes by `event`
//! - `auth_events_total` (counter): session changes by `kind`
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(decision: &'static str) {
    ::metrics::counter!("gate_requests_total", "decision" => decision).increment(1);
}

pub fn record_rate_limited() {
    ::metrics::counter!("gate_rate_limited_total").increment(1);
}

pub fn record_session_lookup_error() {
    ::metrics::counter!("gate_session_lookup_errors_total").increment(1);
}

pub fn record_upstream(status: u16, start: Instant) {
    ::metrics::counter!("gate_upstream_responses_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("gate_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_verification_event(event: &'static str) {
    ::metrics::counter!("verification_events_total", "event" => event).increment(1);
}

pub fn record_auth_event(kind: &'static str) {
    ::metrics::counter!("auth_events_total", "kind" => kind).increment(1);
}
