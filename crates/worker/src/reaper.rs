//! Periodic recovery of recipients stuck in `sending`.
//!
//! A worker that dies between claim and reconciliation leaves its recipient
//! in `sending` forever. When enabled, [`StaleClaimReaper`] returns such rows
//! to `ready` once their claim is older than the configured threshold. A row
//! whose email did go out but whose `sent` write was lost will be sent again,
//! so the reaper is off unless `WORKER_STALE_SENDING_MINS` is set.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::store::RecipientStore;

/// Background task resetting stale `sending` claims.
pub struct StaleClaimReaper {
    store: Arc<dyn RecipientStore>,
    stale_after: Duration,
    interval: Duration,
}

impl StaleClaimReaper {
    pub fn new(store: Arc<dyn RecipientStore>, stale_after: Duration, interval: Duration) -> Self {
        Self {
            store,
            stale_after,
            interval,
        }
    }

    /// Run the reaper loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            stale_after_secs = self.stale_after.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Stale claim reaper started",
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale claim reaper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.reap_once().await {
                        Ok(0) => tracing::debug!("Stale claim reaper: nothing to reset"),
                        Ok(reset) => {
                            tracing::warn!(reset, "Stale claim reaper: returned recipients to ready");
                        }
                        Err(e) => tracing::error!(error = %e, "Stale claim reaper failed"),
                    }
                }
            }
        }
    }

    /// Reset every claim older than the threshold. Returns the number reset.
    pub async fn reap_once(&self) -> Result<u64, WorkerError> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .map_err(|e| WorkerError::Config(format!("stale threshold out of range: {e}")))?;
        let cutoff = Utc::now() - stale_after;
        Ok(self.store.reclaim_stale(cutoff).await?)
    }
}
