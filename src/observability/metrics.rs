//! Metrics collection and exposition.
//!
//! # Metrics
//! - `charitrace_http_requests_total` (counter): requests by method, route, status
//! - `charitrace_http_request_duration_seconds` (histogram): latency distribution
//! - `charitrace_verifications_total` (counter): verify outcomes
//! - `charitrace_chain_submission_duration_seconds` (histogram): submit + mine latency
//! - `charitrace_sweep_items_total` (counter): sweep results
//! - `charitrace_chain_healthy` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("charitrace_http_requests_total", &labels).increment(1);
    histogram!("charitrace_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of one `verify_donation` call
/// (`verified`, `already_verified`, `pending`, `error`).
pub fn record_verification(outcome: &'static str) {
    counter!("charitrace_verifications_total", "outcome" => outcome).increment(1);
}

/// Record a chain submission, successful or not.
pub fn record_chain_submission(success: bool, start: Instant) {
    let outcome = if success { "success" } else { "failure" };
    histogram!("charitrace_chain_submission_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one item processed by a background sweep.
pub fn record_sweep_item(result: &'static str) {
    counter!("charitrace_sweep_items_total", "result" => result).increment(1);
}

pub fn record_chain_health(healthy: bool) {
    gauge!("charitrace_chain_healthy").set(if healthy { 1.0 } else { 0.0 });
}
