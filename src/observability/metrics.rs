//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (sessions, forwarding latency, node health)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `balancer_sessions_total` (counter): finished sessions by outcome
//! - `balancer_active_sessions` (gauge): sessions currently open
//! - `balancer_forward_duration_seconds` (histogram): backend round trip by node
//! - `balancer_node_health` (gauge): 1=healthy, 0=unhealthy, by node
//! - `balancer_available_nodes` (gauge): size of the latest snapshot
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder the macros are no-ops
//! - Node labels use `host:port`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count a finished session. `outcome` is a short static label
/// such as `relayed` or `no_healthy_node`.
pub fn record_session_outcome(outcome: &'static str) {
    counter!("balancer_sessions_total", "outcome" => outcome).increment(1);
}

pub fn record_active_sessions(count: usize) {
    gauge!("balancer_active_sessions").set(count as f64);
}

/// Record one backend hop, measured from `start`.
pub fn record_forward_duration(node: &str, start: Instant) {
    histogram!("balancer_forward_duration_seconds", "node" => node.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_node_health(node: &str, healthy: bool) {
    gauge!("balancer_node_health", "node" => node.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_available_nodes(count: usize) {
    gauge!("balancer_available_nodes").set(count as f64);
}
