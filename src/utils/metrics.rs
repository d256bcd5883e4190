//! Process metrics and the optional Prometheus endpoint

use crate::{MonitorError, Result};
use ::metrics::{counter, describe_counter, describe_gauge, gauge, increment_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Completed cycles
pub const CYCLES_TOTAL: &str = "frm_cycles_total";
/// Errors recorded in cycle reports
pub const CYCLE_ERRORS_TOTAL: &str = "frm_cycle_errors_total";
/// Below-threshold pairs seen
pub const ALERTS_TOTAL: &str = "frm_alerts_total";
/// Reports or announcements that could not be delivered
pub const DELIVERY_FAILURES_TOTAL: &str = "frm_delivery_failures_total";
/// Pairs rated in the latest cycle
pub const PAIRS_TRACKED: &str = "frm_pairs_tracked";
/// Positions left unpaired in the latest cycle
pub const UNMATCHED_POSITIONS: &str = "frm_unmatched_positions";

/// Start the Prometheus exporter on `listen_addr` and describe all metrics.
/// Must be called from within a Tokio runtime.
pub fn install_prometheus_exporter(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr.parse().map_err(|e| {
        MonitorError::Config(format!(
            "Invalid metrics listen address {}: {}",
            listen_addr, e
        ))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MonitorError::Config(format!("Failed to start metrics exporter: {}", e)))?;

    describe_counter!(CYCLES_TOTAL, "Completed monitoring cycles");
    describe_counter!(CYCLE_ERRORS_TOTAL, "Errors recorded in cycle reports");
    describe_counter!(ALERTS_TOTAL, "Pairs whose differential fell below the threshold");
    describe_counter!(DELIVERY_FAILURES_TOTAL, "Failed report deliveries");
    describe_gauge!(PAIRS_TRACKED, "Pairs rated in the latest cycle");
    describe_gauge!(UNMATCHED_POSITIONS, "Positions left unpaired in the latest cycle");

    Ok(())
}

/// Record the outcome of one cycle
pub fn record_cycle(pairs: usize, alerts: usize, errors: usize, unmatched: usize) {
    increment_counter!(CYCLES_TOTAL);
    counter!(ALERTS_TOTAL, alerts as u64);
    counter!(CYCLE_ERRORS_TOTAL, errors as u64);
    gauge!(PAIRS_TRACKED, pairs as f64);
    gauge!(UNMATCHED_POSITIONS, unmatched as f64);
}

/// Record a failed delivery
pub fn record_delivery_failure(kind: &'static str) {
    increment_counter!(DELIVERY_FAILURES_TOTAL, "kind" => kind);
}
