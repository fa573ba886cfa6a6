//! Server configuration.

use std::time::Duration;

use webpanel_settings::PanelSettings;

/// Configuration for the panel server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound queue capacity per session.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message and frame size in bytes.
    pub max_message_size: usize,
    /// Capacity of each hub event channel.
    pub hub_channel_capacity: usize,
    /// Rolling read deadline.
    pub read_timeout: Duration,
    /// Deadline for a single write.
    pub write_timeout: Duration,
    /// Send-loop idle time before a ping frame goes out.
    pub ping_interval: Duration,
    /// Period of the `system_info` broadcast.
    pub broadcast_interval: Duration,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &PanelSettings) -> Self {
        let ws = &settings.websocket;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            send_queue_capacity: ws.send_queue_capacity,
            max_message_size: ws.max_message_size,
            hub_channel_capacity: ws.hub_channel_capacity,
            read_timeout: Duration::from_secs(ws.read_timeout_secs),
            write_timeout: Duration::from_secs(ws.write_timeout_secs),
            ping_interval: Duration::from_secs(ws.ping_interval_secs),
            broadcast_interval: Duration::from_secs(ws.broadcast_interval_secs),
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue_capacity: 256,
            max_message_size: 512,
            hub_channel_capacity: 64,
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(54),
            broadcast_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_and_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_timeouts() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.read_timeout, Duration::from_secs(60));
        assert_eq!(cfg.write_timeout, Duration::from_secs(10));
        assert_eq!(cfg.ping_interval, Duration::from_secs(54));
        assert!(cfg.ping_interval < cfg.read_timeout);
    }

    #[test]
    fn default_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.send_queue_capacity, 256);
        assert_eq!(cfg.max_message_size, 512);
    }

    #[test]
    fn from_settings_copies_values() {
        let mut settings = PanelSettings::default();
        settings.server.host = "10.0.0.2".into();
        settings.server.port = 8080;
        settings.websocket.send_queue_capacity = 4;
        settings.websocket.broadcast_interval_secs = 30;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "10.0.0.2:8080");
        assert_eq!(cfg.send_queue_capacity, 4);
        assert_eq!(cfg.broadcast_interval, Duration::from_secs(30));
        assert_eq!(cfg.max_message_size, 512);
    }
}
