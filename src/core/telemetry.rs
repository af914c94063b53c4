//! Prometheus metrics for guard decisions.
//!
//! # Metrics
//! - `traffic_guard_requests_total` (counter): requests by decision
//! - `traffic_guard_flagged_total` (counter): rule matches by rule
//! - `traffic_guard_evicted_total` (counter): profiles removed by sweeps
//! - `traffic_guard_profiles` (gauge): profiles currently tracked

use std::net::SocketAddr;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::core::classifier::DetectionRule;

/// Install the Prometheus exporter listening on `addr`
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_decision(decision: &'static str) {
    metrics::increment_counter!("traffic_guard_requests_total", "decision" => decision);
}

pub fn record_flagged(rule: DetectionRule) {
    metrics::increment_counter!("traffic_guard_flagged_total", "rule" => rule.as_str());
}

pub fn record_sweep(evicted: usize, remaining: usize) {
    metrics::counter!("traffic_guard_evicted_total", evicted as u64);
    metrics::gauge!("traffic_guard_profiles", remaining as f64);
}
