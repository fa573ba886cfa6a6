//! Shutdown signalling for the HTTP server and background tasks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace period used when the caller gives none.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the token that the HTTP server and the periodic broadcaster watch.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the token for a task to watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal every watcher. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal shutdown, then wait for `handles` up to `timeout`.
    ///
    /// Tasks still running when the timeout expires are aborted. Returns
    /// `true` if everything finished in time.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        info!(tasks = handles.len(), timeout_ms = timeout.as_millis(), "draining background tasks");

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_ok()
        {
            return true;
        }
        warn!(?timeout, "shutdown timed out, aborting remaining tasks");
        for abort in aborts {
            abort.abort();
        }
        false
    }
}
