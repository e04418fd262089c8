//! Server and hub configuration.

use std::time::Duration;

use relay_settings::RelaySettings;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Fan-out behaviour.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 1024 * 1024,
            hub: HubConfig::default(),
        }
    }
}

impl From<&RelaySettings> for ServerConfig {
    fn from(settings: &RelaySettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            max_message_size: server.max_message_size,
            hub: HubConfig::from(settings),
        }
    }
}

/// Configuration for the hub: mailboxes, limits, delivery policy.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Outbound mailbox capacity per session.
    pub mailbox_capacity: usize,
    /// Maximum concurrent sessions (`0` = unlimited).
    pub max_sessions: usize,
    /// Deliver each broadcast back to its sender too.
    pub echo_to_sender: bool,
    /// Text sent to a client right after it connects.
    pub greeting: Option<String>,
    /// Per-session keepalive; `None` disables it.
    pub heartbeat: Option<HeartbeatConfig>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            max_sessions: 0,
            echo_to_sender: true,
            greeting: None,
            heartbeat: None,
        }
    }
}

impl From<&RelaySettings> for HubConfig {
    fn from(settings: &RelaySettings) -> Self {
        let server = &settings.server;
        let heartbeat = settings.heartbeat.enabled.then(|| HeartbeatConfig {
            interval: Duration::from_millis(settings.heartbeat.interval_ms.max(1)),
            payload: settings.heartbeat.payload.clone(),
        });
        Self {
            mailbox_capacity: server.mailbox_capacity.max(1),
            max_sessions: server.max_sessions,
            echo_to_sender: server.echo_to_sender,
            greeting: server.greeting.clone(),
            heartbeat,
        }
    }
}

/// Keepalive sentinel settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between sentinel sends.
    pub interval: Duration,
    /// Sentinel text payload.
    pub payload: String,
}
