//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): tunneled requests by outcome
//! - `relay_request_duration_seconds` (histogram): time from accept to response
//! - `relay_active_sessions` (gauge): live endpoint sessions
//! - `relay_bytes_forwarded_total` (counter): payload bytes written to the HTTP side
//! - `relay_policy_served_total` (counter): policy documents served by kind
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// How a tunneled request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 200 with the endpoint's payload.
    Complete,
    /// Endpoint sentinel forwarded.
    Sentinel,
    /// 500, request did not match.
    ParseFailure,
    /// 503, endpoint went away.
    Disconnected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Complete => "complete",
            Outcome::Sentinel => "sentinel",
            Outcome::ParseFailure => "parse_failure",
            Outcome::Disconnected => "disconnected",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: Outcome, start: Instant) {
    counter!("relay_requests_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_bytes_forwarded(bytes: usize) {
    counter!("relay_bytes_forwarded_total").increment(bytes as u64);
}

pub fn set_active_sessions(active: u64) {
    gauge!("relay_active_sessions").set(active as f64);
}

pub fn record_policy_served(kind: &'static str) {
    counter!("relay_policy_served_total", "kind" => kind).increment(1);
}
