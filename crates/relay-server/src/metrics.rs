//! Prometheus recorder and hub metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle that renders `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Sessions attached (counter).
pub const HUB_CONNECTIONS_TOTAL: &str = "hub_connections_total";
/// Sessions torn down (counter, labels: reason).
pub const HUB_DISCONNECTIONS_TOTAL: &str = "hub_disconnections_total";
/// Sessions currently registered (gauge).
pub const HUB_CONNECTIONS_ACTIVE: &str = "hub_connections_active";
/// Messages read from clients (counter).
pub const HUB_MESSAGES_INBOUND_TOTAL: &str = "hub_messages_inbound_total";
/// Mailbox enqueues that succeeded (counter).
pub const HUB_MESSAGES_DELIVERED_TOTAL: &str = "hub_messages_delivered_total";
/// Sessions disconnected for a full mailbox (counter).
pub const HUB_SLOW_CONSUMER_EVICTIONS_TOTAL: &str = "hub_slow_consumer_evictions_total";
/// Session lifetime at teardown (histogram).
pub const HUB_SESSION_DURATION_SECONDS: &str = "hub_session_duration_seconds";
