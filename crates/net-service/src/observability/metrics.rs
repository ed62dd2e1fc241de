//! Metrics definitions for the net service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `net_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `command`: bounded by the net command set (~12 values)
//! - `status`: `success` or an error type label (8 values)
//! - `scope`: `net` or `global`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` route.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("net_command".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set command duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Metric: `net_nets_active` (nets with a running actor)
pub fn set_nets_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("net_nets_active").set(count as f64);
}

/// Metric: `net_connections_active` (open real-time connections)
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("net_connections_active").set(count as f64);
}

/// Record a processed net command.
///
/// Metrics: `net_commands_total{command,status}`,
/// `net_command_duration_seconds{command}`
pub fn record_command(command: &'static str, status: &'static str, duration: Duration) {
    counter!("net_commands_total", "command" => command, "status" => status).increment(1);
    histogram!("net_command_duration_seconds", "command" => command)
        .record(duration.as_secs_f64());
}

/// Metric: `net_events_published_total{scope}`
pub fn record_event_published(scope: &'static str, recipients: usize) {
    counter!("net_events_published_total", "scope" => scope).increment(1);
    counter!("net_event_deliveries_total", "scope" => scope).increment(recipients as u64);
}

/// Metric: `net_events_dropped_total` (frames not handed to a connection: queue full or closed)
pub fn record_events_dropped(count: usize) {
    counter!("net_events_dropped_total").increment(count as u64);
}

/// Metric: `net_media_credentials_total{status}`
pub fn record_media_credential(status: &'static str) {
    counter!("net_media_credentials_total", "status" => status).increment(1);
}
