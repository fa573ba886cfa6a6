//! Periodic `system_info` broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::envelope::{Envelope, SYSTEM_INFO};
use super::hub::Hub;
use crate::stats::StatsProvider;

/// Pushes a stats snapshot through the hub on a fixed interval.
pub struct PeriodicBroadcaster {
    hub: Hub,
    stats: Arc<dyn StatsProvider>,
    interval: Duration,
}

impl PeriodicBroadcaster {
    /// Create a broadcaster.
    pub fn new(hub: Hub, stats: Arc<dyn StatsProvider>, interval: Duration) -> Self {
        Self {
            hub,
            stats,
            interval,
        }
    }

    /// Tick until `cancel` fires. The first broadcast happens one interval in.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = ticker.tick().await;
        info!(interval_ms = self.interval.as_millis(), "periodic broadcaster started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                }
            }
        }
        info!("periodic broadcaster stopped");
    }

    /// One tick. Returns `true` if a snapshot was broadcast.
    ///
    /// Skips collection entirely when nobody is connected. The session count
    /// is not re-checked after collection.
    pub async fn tick(&self) -> bool {
        if self.hub.session_count() == 0 {
            return false;
        }
        let info = match self.stats.snapshot().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "stats snapshot failed, skipping broadcast");
                return false;
            }
        };
        match Envelope::with_payload(SYSTEM_INFO, &info) {
            Ok(env) => {
                self.hub.broadcast(&env).await;
                debug!(recipients = self.hub.session_count(), "system info broadcast");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to encode system info");
                false
            }
        }
    }
}
