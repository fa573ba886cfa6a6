//! `PanelServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::inventory::{HostInventory, SystemInventory};
use crate::metrics::WS_UPGRADE_FAILURES_TOTAL;
use crate::recording::RecordingState;
use crate::shutdown::ShutdownCoordinator;
use crate::stats::StatsProvider;
use crate::websocket::{Hub, MessageRouter, PeriodicBroadcaster, SessionConfig, SessionId, run_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live-update hub.
    pub hub: Hub,
    /// Inbound message router handed to each session.
    pub router: MessageRouter,
    /// Stats collaborator.
    pub stats: Arc<dyn StatsProvider>,
    /// Recorder collaborator.
    pub recording: Arc<dyn RecordingState>,
    /// Process and service listings.
    pub inventory: Arc<dyn HostInventory>,
    /// Per-session timing and queue settings.
    pub session: SessionConfig,
    /// Largest accepted inbound message and frame.
    pub max_message_size: usize,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// The panel server.
pub struct PanelServer {
    config: ServerConfig,
    hub: Hub,
    stats: Arc<dyn StatsProvider>,
    recording: Arc<dyn RecordingState>,
    inventory: Arc<dyn HostInventory>,
    metrics: PrometheusHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl PanelServer {
    /// Create a server and spawn its hub. Must be called inside a Tokio runtime.
    pub fn new(
        config: ServerConfig,
        stats: Arc<dyn StatsProvider>,
        recording: Arc<dyn RecordingState>,
        metrics: PrometheusHandle,
    ) -> Self {
        let hub = Hub::spawn(config.hub_channel_capacity);
        Self {
            config,
            hub,
            stats,
            recording,
            inventory: SystemInventory::shared(),
            metrics,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Replace the process and service inventory.
    #[must_use]
    pub fn with_inventory(mut self, inventory: Arc<dyn HostInventory>) -> Self {
        self.inventory = inventory;
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            router: MessageRouter::new(
                self.hub.clone(),
                Arc::clone(&self.stats),
                Arc::clone(&self.recording),
            ),
            stats: Arc::clone(&self.stats),
            recording: Arc::clone(&self.recording),
            inventory: Arc::clone(&self.inventory),
            session: SessionConfig::from(&self.config),
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/api/system", get(api::system_info))
            .route("/api/processes", get(api::processes))
            .route("/api/services", get(api::services))
            .route("/api/camera/status", get(api::camera_status))
            .route("/api/camera/start-recording", post(api::start_recording))
            .route("/api/camera/stop-recording", post(api::stop_recording))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "panel server listening");
        Ok((addr, handle))
    }

    /// Spawn the periodic `system_info` broadcaster, bound to the shutdown token.
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let broadcaster = PeriodicBroadcaster::new(
            self.hub.clone(),
            Arc::clone(&self.stats),
            self.config.broadcast_interval,
        );
        vec![tokio::spawn(broadcaster.run(self.shutdown.token()))]
    }

    /// Get the hub.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.hub.session_count()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let id = SessionId::new();
    ws.max_message_size(state.max_message_size)
        .max_frame_size(state.max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(session_id = %id, error = %e, "websocket upgrade failed");
            counter!(WS_UPGRADE_FAILURES_TOTAL).increment(1);
        })
        .on_upgrade(move |socket| run_session(socket, id, state.hub, state.router, state.session))
        .into_response()
}
