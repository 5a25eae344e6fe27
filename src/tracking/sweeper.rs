use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info};

use super::TrackingRegistry;

/// Periodic eviction driver. Owns nothing but its schedule; all state lives
/// in the registry, so a sweep interleaving with in-flight requests is safe.
pub struct RetentionSweeper {
    registry: Arc<TrackingRegistry>,
    interval: Duration,
    horizon: chrono::Duration,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<TrackingRegistry>,
        interval: Duration,
        horizon: chrono::Duration,
    ) -> Self {
        Self {
            registry,
            interval,
            horizon,
        }
    }

    /// Spawn the sweep loop and return its shutdown handle. Sending `true`
    /// (or dropping the sender) stops the loop between sweeps; eviction
    /// itself is never interrupted mid-pass.
    pub fn spawn(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            // Skip the first tick which fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.registry.evict_older_than(self.horizon, chrono::Utc::now());
                        debug!(
                            live_messages = self.registry.message_count(),
                            "retention sweep complete"
                        );
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("retention sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
