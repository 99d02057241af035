//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_transitions_total` (counter): state changes by breaker, from, to
//! - `circuit_breaker_rejections_total` (counter): fail-fast rejections by breaker, reason
//! - `circuit_breaker_outcomes_total` (counter): recorded outcomes by breaker, outcome
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in and owned by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::state::State;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_transition(breaker: &str, from: State, to: State) {
    ::metrics::counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_state(breaker: &str, state: State) {
    ::metrics::gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(state.gauge_value());
}

pub fn record_rejection(breaker: &str, reason: &'static str) {
    ::metrics::counter!(
        "circuit_breaker_rejections_total",
        "breaker" => breaker.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_outcome(breaker: &str, outcome: &'static str) {
    ::metrics::counter!(
        "circuit_breaker_outcomes_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
