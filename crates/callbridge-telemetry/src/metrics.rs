//! Prometheus recorder and metric names.

pub use metrics_exporter_prometheus::PrometheusHandle;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::TelemetryError;

/// Install the global Prometheus recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Inbound events handled (counter, labels: event).
pub const RELAY_EVENTS_TOTAL: &str = "relay_events_total";
/// Inbound frames rejected before reaching the engine (counter, labels: kind).
pub const RELAY_REJECTED_TOTAL: &str = "relay_rejected_total";
/// Outbound frames dropped on a full or closed queue (counter).
pub const RELAY_DISPATCH_DROPS_TOTAL: &str = "relay_dispatch_drops_total";
/// Sessions created (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Sessions removed by the TTL sweep (counter).
pub const SESSIONS_EXPIRED_TOTAL: &str = "sessions_expired_total";
/// Sessions currently held (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
