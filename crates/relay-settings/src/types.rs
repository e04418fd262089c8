//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file is valid: missing fields take their default value.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the relay hub.
///
/// ```json
/// {
///   "server": { "port": 9090, "echoToSender": false },
///   "heartbeat": { "enabled": true }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and fan-out settings.
    pub server: ServerSettings,
    /// Per-session keepalive settings.
    pub heartbeat: HeartbeatSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.mailbox_capacity == 0 {
            return Err(SettingsError::InvalidValue {
                field: "server.mailboxCapacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(SettingsError::InvalidValue {
                field: "heartbeat.intervalMs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Server network and fan-out settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Outbound mailbox capacity per session. A session whose mailbox is
    /// full during a broadcast is disconnected.
    pub mailbox_capacity: usize,
    /// Maximum concurrent sessions (`0` = unlimited).
    pub max_sessions: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Whether a broadcast is also delivered back to its sender.
    pub echo_to_sender: bool,
    /// Message sent to each client right after it connects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mailbox_capacity: 256,
            max_sessions: 0,
            max_message_size: 1024 * 1024,
            echo_to_sender: true,
            greeting: None,
        }
    }
}

/// Keepalive settings. When enabled every session gets a task that sends
/// `payload` each `interval_ms` and disconnects the client on send failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatSettings {
    /// Whether the keepalive task runs.
    pub enabled: bool,
    /// Interval between sentinel sends, in milliseconds.
    pub interval_ms: u64,
    /// Sentinel text payload.
    pub payload: String,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 30_000,
            payload: "heartbeat".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
