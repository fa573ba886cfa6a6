//! System stats collaborator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};
use thiserror::Error;

/// Errors from a stats provider.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The collection task panicked or was cancelled.
    #[error("stats collection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Provider-specific failure.
    #[error("stats unavailable: {0}")]
    Unavailable(String),
}

/// A point-in-time host snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// CPU usage, percent.
    pub cpu_usage: f64,
    /// Memory used, percent of total.
    pub memory_usage: f64,
    /// Disk used, percent of total.
    pub disk_usage: f64,
    /// Human-readable host uptime.
    pub uptime: String,
    /// Unix seconds when the snapshot was taken.
    pub timestamp: i64,
}

/// Source of [`SystemInfo`] snapshots.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Collect a fresh snapshot.
    async fn snapshot(&self) -> Result<SystemInfo, StatsError>;
}

/// `sysinfo`-backed provider.
///
/// CPU usage needs two samples, so each snapshot blocks for
/// [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] on the blocking pool.
#[derive(Clone, Debug, Default)]
pub struct SystemStatsProvider;

impl SystemStatsProvider {
    /// Create a provider.
    pub fn new() -> Self {
        Self
    }

    /// Shared, type-erased instance.
    pub fn shared() -> Arc<dyn StatsProvider> {
        Arc::new(Self)
    }
}

#[async_trait]
impl StatsProvider for SystemStatsProvider {
    async fn snapshot(&self) -> Result<SystemInfo, StatsError> {
        Ok(tokio::task::spawn_blocking(collect).await?)
    }
}

fn collect() -> SystemInfo {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));
    let disk_usage = disk.map_or(0.0, |d| {
        percent(d.total_space().saturating_sub(d.available_space()), d.total_space())
    });

    SystemInfo {
        cpu_usage: f64::from(sys.global_cpu_usage()),
        memory_usage: percent(sys.used_memory(), sys.total_memory()),
        disk_usage,
        uptime: format_uptime(System::uptime()),
        timestamp: chrono::Utc::now().timestamp(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Format seconds as `"{d}d {h}h {m}m"`, dropping leading zero units.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = secs / 3_600 % 24;
    let minutes = secs / 60 % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
