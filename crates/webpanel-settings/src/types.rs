//! Settings types.
//!
//! Keys are snake_case and grouped by section. Flat keys from older
//! `config.json` files (`port`, `debug`, `camera_ip`) are lifted into their
//! sections by the loader before these types see them.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Camera / recording settings.
    pub camera: CameraSettings,
    /// Live-update channel tuning.
    pub websocket: WebSocketSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl PanelSettings {
    /// Check that every interval, timeout, and capacity is usable.
    pub fn validate(&self) -> Result<()> {
        let ws = &self.websocket;
        let non_zero = [
            ("send_queue_capacity", ws.send_queue_capacity as u64),
            ("max_message_size", ws.max_message_size as u64),
            ("hub_channel_capacity", ws.hub_channel_capacity as u64),
            ("read_timeout_secs", ws.read_timeout_secs),
            ("write_timeout_secs", ws.write_timeout_secs),
            ("ping_interval_secs", ws.ping_interval_secs),
            ("broadcast_interval_secs", ws.broadcast_interval_secs),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "websocket.{name} must be greater than zero"
                )));
            }
        }
        let ip = self.camera.ip.trim();
        if ip.is_empty() || ip.chars().any(char::is_whitespace) {
            return Err(SettingsError::InvalidValue(format!(
                "camera.ip must be a host or host:port, got {:?}",
                self.camera.ip
            )));
        }
        if ws.ping_interval_secs >= ws.read_timeout_secs {
            return Err(SettingsError::InvalidValue(format!(
                "websocket.ping_interval_secs ({}) must be shorter than read_timeout_secs ({})",
                ws.ping_interval_secs, ws.read_timeout_secs
            )));
        }
        Ok(())
    }

    /// Log filter to use when `RUST_LOG` is not set.
    ///
    /// `server.debug` forces `debug` unless a more verbose level is configured.
    pub fn effective_log_level(&self) -> &str {
        if self.server.debug && self.logging.level != "trace" {
            "debug"
        } else {
            &self.logging.level
        }
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Verbose logging.
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
        }
    }
}

/// Camera settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera address (`host:port`).
    pub ip: String,
    /// Directory recording file names are placed under.
    pub recordings_dir: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            ip: "192.168.1.41:8080".to_string(),
            recordings_dir: "recordings".to_string(),
        }
    }
}

/// Live-update channel tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketSettings {
    /// Outbound queue capacity per session.
    pub send_queue_capacity: usize,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
    /// Capacity of each hub event channel.
    pub hub_channel_capacity: usize,
    /// Read deadline, refreshed on every inbound frame.
    pub read_timeout_secs: u64,
    /// Deadline for a single outbound write.
    pub write_timeout_secs: u64,
    /// Idle time before the server sends a ping frame.
    pub ping_interval_secs: u64,
    /// Period of the system-info broadcast.
    pub broadcast_interval_secs: u64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            max_message_size: 512,
            hub_channel_capacity: 64,
            read_timeout_secs: 60,
            write_timeout_secs: 10,
            ping_interval_secs: 54,
            broadcast_interval_secs: 5,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive (`error`..`trace`).
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
