//! Background service that reclaims leftover artifacts.
//!
//! Artifacts are normally deleted shortly after they are served. Files from
//! failed jobs, clients that never fetched their file, or a crash before the
//! cleanup timer fired stay behind; this service removes them once they are
//! older than the configured age.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use clipfetch_media::ArtifactStore;

use crate::metrics;

/// Stale artifact sweeper.
pub struct ArtifactJanitor {
    artifacts: ArtifactStore,
    interval: Duration,
    max_age: Duration,
}

impl ArtifactJanitor {
    /// Create a janitor sweeping `artifacts` every `interval`.
    pub fn new(artifacts: ArtifactStore, interval: Duration, max_age: Duration) -> Self {
        Self {
            artifacts,
            interval,
            max_age,
        }
    }

    /// Run the sweep loop until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting artifact janitor (interval: {:?}, max age: {:?})",
            self.interval, self.max_age
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    debug!("Artifact janitor stopping");
                    break;
                }
            }
        }
    }

    /// Run a single sweep. Returns the number of files removed.
    pub async fn sweep_once(&self) -> usize {
        match self.artifacts.sweep_stale(self.max_age).await {
            Ok(removed) => {
                if removed > 0 {
                    metrics::record_artifacts_swept(removed);
                }
                removed
            }
            Err(e) => {
                error!("Artifact sweep failed: {}", e);
                0
            }
        }
    }
}
