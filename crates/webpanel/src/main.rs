//! # webpanel
//!
//! Web panel server binary: loads settings, starts the HTTP/WebSocket server
//! and the periodic stats broadcast, and shuts down on Ctrl-C.

#![deny(unsafe_code)]

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use webpanel_server::config::ServerConfig;
use webpanel_server::recording::CameraRecorder;
use webpanel_server::server::PanelServer;
use webpanel_server::stats::SystemStatsProvider;
use webpanel_settings::PanelSettings;

/// Web panel server.
#[derive(Parser, Debug)]
#[command(name = "webpanel", about = "Web panel server")]
struct Cli {
    /// Config file (default: `$WEBPANEL_CONFIG` or `./config.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(webpanel_settings::settings_path)
    }

    fn apply(&self, settings: &mut PanelSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings_path();
    let mut settings = webpanel_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);

    telemetry::init(settings.effective_log_level(), settings.logging.json);
    info!(path = %path.display(), debug = settings.server.debug, "settings loaded");

    let metrics = webpanel_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let recorder = Arc::new(
        CameraRecorder::new(&settings.camera.recordings_dir).with_camera(settings.camera.ip.clone()),
    );
    let server = PanelServer::new(
        ServerConfig::from_settings(&settings),
        SystemStatsProvider::shared(),
        recorder,
        metrics,
    );

    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    let mut tasks = server.start_background();
    info!(camera = %settings.camera.ip, "web panel listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    tasks.push(handle);
    let _ = server.shutdown().drain(tasks, None).await;

    info!("Shutdown complete");
    Ok(())
}
