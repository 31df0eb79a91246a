//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): HTTP calls by response status
//! - `relay_request_duration_seconds` (histogram): time from arrival to reply
//! - `relay_sessions` (gauge): tracked sessions by state
//! - `relay_in_flight_requests` (gauge): requests awaiting a peer reply
//! - `relay_buffered_bytes` (gauge): bytes held for unbound sessions
//! - `relay_evictions_total` (counter): evictions by cause
//! - `relay_bindings_total` (counter): socket bind attempts by outcome
//! - `relay_protocol_violations_total` (counter): malformed peer frames
//!
//! Without an installed exporter every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::relay::registry::RegistryStats;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start_time: Instant) {
    counter!("relay_requests_total", "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_eviction(cause: &'static str) {
    counter!("relay_evictions_total", "cause" => cause).increment(1);
}

pub fn record_binding(outcome: &'static str) {
    counter!("relay_bindings_total", "outcome" => outcome).increment(1);
}

pub fn record_protocol_violation() {
    counter!("relay_protocol_violations_total").increment(1);
}

pub fn record_sessions(stats: &RegistryStats) {
    gauge!("relay_sessions", "state" => "bound").set(stats.bound as f64);
    gauge!("relay_sessions", "state" => "unbound").set(stats.unbound as f64);
    gauge!("relay_in_flight_requests").set(stats.in_flight as f64);
    gauge!("relay_buffered_bytes").set(stats.buffered_bytes as f64);
}
