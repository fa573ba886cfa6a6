//! Read-only host inventory: running processes and service status.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;
use tracing::debug;

use crate::stats::StatsError;

/// Services queried when none are configured.
pub const DEFAULT_SERVICES: &[&str] = &["nginx", "apache2", "mysql", "postgresql", "redis", "docker"];

/// Longest command line reported before truncation, in characters.
pub const MAX_COMMAND_LEN: usize = 100;

const SERVICE_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// One running process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process id.
    pub pid: u32,
    /// Executable name.
    pub name: String,
    /// CPU usage, percent of one core.
    pub cpu: f64,
    /// Resident memory, percent of total.
    pub memory: f64,
    /// Scheduler status (`"Run"`, `"Sleep"`, ...).
    pub status: String,
    /// Command line, truncated to [`MAX_COMMAND_LEN`] characters.
    pub command: String,
}

/// Status of one system service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Unit name.
    pub name: String,
    /// `systemctl is-active` output, or `"unknown"`.
    pub status: String,
    /// Whether the service is running.
    pub active: bool,
}

impl ServiceInfo {
    /// Build from a unit name and its reported status.
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        let status = status.into();
        let active = status == "active" || status == "running";
        Self {
            name: name.into(),
            status,
            active,
        }
    }
}

/// Source of process and service listings.
#[async_trait]
pub trait HostInventory: Send + Sync {
    /// List running processes, ordered by pid.
    async fn processes(&self) -> Result<Vec<ProcessInfo>, StatsError>;

    /// Report the status of each monitored service.
    async fn services(&self) -> Vec<ServiceInfo>;
}

/// `sysinfo` and `systemctl` backed inventory.
#[derive(Clone, Debug)]
pub struct SystemInventory {
    services: Vec<String>,
}

impl Default for SystemInventory {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICES.iter().map(|s| (*s).to_string()).collect())
    }
}

impl SystemInventory {
    /// Inventory monitoring the given service units.
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }

    /// Shared, type-erased instance with the default service list.
    pub fn shared() -> Arc<dyn HostInventory> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl HostInventory for SystemInventory {
    async fn processes(&self) -> Result<Vec<ProcessInfo>, StatsError> {
        Ok(tokio::task::spawn_blocking(collect_processes).await?)
    }

    async fn services(&self) -> Vec<ServiceInfo> {
        futures::future::join_all(self.services.iter().map(|name| async move {
            ServiceInfo::new(name.as_str(), query_service(name).await)
        }))
        .await
    }
}

fn collect_processes() -> Vec<ProcessInfo> {
    let refresh = ProcessRefreshKind::everything();
    let mut sys = System::new();
    sys.refresh_memory();
    let _ = sys.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    let _ = sys.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

    let total_memory = sys.total_memory();
    let mut list: Vec<ProcessInfo> = sys
        .processes()
        .values()
        .map(|p| {
            let cmd = p
                .cmd()
                .iter()
                .map(|part| part.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu: f64::from(p.cpu_usage()),
                memory: memory_percent(p.memory(), total_memory),
                status: p.status().to_string(),
                command: truncate_command(&cmd),
            }
        })
        .collect();
    list.sort_by_key(|p| p.pid);
    list
}

#[allow(clippy::cast_precision_loss)]
fn memory_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Cut a command line to [`MAX_COMMAND_LEN`] characters, marking the cut with `...`.
pub fn truncate_command(cmd: &str) -> String {
    match cmd.char_indices().nth(MAX_COMMAND_LEN) {
        Some((cut, _)) => format!("{}...", &cmd[..cut]),
        None => cmd.to_string(),
    }
}

async fn query_service(name: &str) -> String {
    let output = Command::new("systemctl")
        .arg("is-active")
        .arg(name)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(SERVICE_QUERY_TIMEOUT, output).await {
        Ok(Ok(out)) => parse_service_status(&out.stdout),
        Ok(Err(e)) => {
            debug!(service = name, error = %e, "systemctl unavailable");
            parse_service_status(&[])
        }
        Err(_) => {
            debug!(service = name, "systemctl timed out");
            parse_service_status(&[])
        }
    }
}

/// Status word from `systemctl is-active` stdout; `"unknown"` when empty.
///
/// `is-active` exits non-zero for inactive units, so stdout is read regardless
/// of exit status.
pub fn parse_service_status(stdout: &[u8]) -> String {
    let text = String::from_utf8_lossy(stdout);
    match text.lines().next().map(str::trim) {
        Some(word) if !word.is_empty() => word.to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_command_is_kept() {
        assert_eq!(truncate_command("/usr/bin/sleep 10"), "/usr/bin/sleep 10");
        assert_eq!(truncate_command(""), "");
        let exact = "a".repeat(MAX_COMMAND_LEN);
        assert_eq!(truncate_command(&exact), exact);
    }

    #[test]
    fn long_command_is_cut_with_marker() {
        let long = "b".repeat(MAX_COMMAND_LEN + 20);
        let cut = truncate_command(&long);
        assert_eq!(cut.len(), MAX_COMMAND_LEN + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_COMMAND_LEN + 1);
        let cut = truncate_command(&long);
        assert_eq!(cut.chars().count(), MAX_COMMAND_LEN + 3);
    }

    #[test]
    fn service_status_parsing() {
        assert_eq!(parse_service_status(b"active\n"), "active");
        assert_eq!(parse_service_status(b"inactive\n"), "inactive");
        assert_eq!(parse_service_status(b"failed"), "failed");
        assert_eq!(parse_service_status(b""), "unknown");
        assert_eq!(parse_service_status(b"  \n"), "unknown");
    }

    #[test]
    fn service_active_flag() {
        assert!(ServiceInfo::new("nginx", "active").active);
        assert!(ServiceInfo::new("svc", "running").active);
        assert!(!ServiceInfo::new("redis", "inactive").active);
        assert!(!ServiceInfo::new("docker", "unknown").active);
    }

    #[test]
    fn process_wire_shape() {
        let p = ProcessInfo {
            pid: 42,
            name: "webpanel".into(),
            cpu: 1.5,
            memory: 0.25,
            status: "Run".into(),
            command: "webpanel --port 5000".into(),
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["pid"], 42);
        assert_eq!(v["cpu"], 1.5);
        assert_eq!(v["memory"], 0.25);
        assert_eq!(v["command"], "webpanel --port 5000");
    }

    #[tokio::test]
    async fn live_process_list_contains_self() {
        let procs = SystemInventory::default().processes().await.unwrap();
        let me = std::process::id();
        assert!(procs.iter().any(|p| p.pid == me));
        assert!(procs.windows(2).all(|w| w[0].pid <= w[1].pid));
        assert!(procs.iter().all(|p| p.command.chars().count() <= MAX_COMMAND_LEN + 3));
    }

    #[tokio::test]
    async fn services_report_every_configured_unit() {
        let inv = SystemInventory::new(vec!["webpanel-no-such-unit".into()]);
        let services = inv.services().await;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "webpanel-no-such-unit");
        assert!(!services[0].active);
    }
}
