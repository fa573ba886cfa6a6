//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup, before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Sessions in the hub's active set (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Sessions evicted for a full outbound queue (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Failed WebSocket upgrades (counter).
pub const WS_UPGRADE_FAILURES_TOTAL: &str = "ws_upgrade_failures_total";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Broadcasts processed by the hub (counter).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
