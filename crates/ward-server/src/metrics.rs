//! Metrics collection and export for the relay.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use ward_core::BroadcastReport;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "ward_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "ward_connections_active";
    pub const SUBSCRIBERS_ACTIVE: &str = "ward_subscribers_active";
    pub const UPDATES_INGESTED: &str = "ward_updates_ingested_total";
    pub const DELIVERIES_TOTAL: &str = "ward_deliveries_total";
    pub const MESSAGES_BYTES: &str = "ward_messages_bytes";
    pub const ERRORS_TOTAL: &str = "ward_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since relay start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open connections"
    );
    metrics::describe_gauge!(
        names::SUBSCRIBERS_ACTIVE,
        "Current number of registered subscribers"
    );
    metrics::describe_counter!(
        names::UPDATES_INGESTED,
        "Seriousness updates accepted from producers"
    );
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Per-subscriber delivery outcomes of fanned-out updates"
    );
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of frames sent and received");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Update the registered subscriber count.
pub fn set_active_subscribers(count: usize) {
    gauge!(names::SUBSCRIBERS_ACTIVE).set(count as f64);
}

/// Record one ingested update and its fan-out outcome.
pub fn record_update(report: &BroadcastReport) {
    counter!(names::UPDATES_INGESTED).increment(1);
    counter!(names::DELIVERIES_TOTAL, "outcome" => "delivered").increment(report.delivered as u64);
    counter!(names::DELIVERIES_TOTAL, "outcome" => "dropped").increment(report.dropped as u64);
    counter!(names::DELIVERIES_TOTAL, "outcome" => "closed").increment(report.closed as u64);
}

/// Record frame bytes.
pub fn record_bytes(bytes: usize, direction: &'static str) {
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        // No recorder installed, these must be no-ops
        let _guard = ConnectionMetricsGuard::new();
        record_update(&BroadcastReport::default());
        record_error("test");
    }
}
