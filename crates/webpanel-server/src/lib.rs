//! # webpanel-server
//!
//! Axum HTTP + `WebSocket` server for the web panel.
//!
//! - Live-update hub: a single control loop owns the set of connected sessions
//!   and fans out broadcasts, evicting clients whose outbound queue is full
//! - Per-connection send/receive loops with read deadlines, write deadlines,
//!   and idle pings
//! - Message routing for `ping`, `get_system_info`, and `get_camera_status`
//! - Periodic `system_info` broadcast while anyone is listening
//! - REST endpoints for system stats, the process and service listings, and the
//!   camera recorder, plus `/health` and `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod recording;
pub mod server;
pub mod shutdown;
pub mod stats;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::PanelServer;
