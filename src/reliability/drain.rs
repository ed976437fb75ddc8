use super::persist;
use super::retry::RetryConfig;
use crate::export::{ExportResult, Exporter};
use crate::storage::FileBlobStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Pause between drain cycles while the exporter is healthy.
    pub interval: Duration,
    /// Checkout period taken on each blob before re-exporting it.
    pub lease_period: Duration,
    /// Bound on each export call during a drain.
    pub export_timeout: Duration,
    /// Backoff across consecutive failing cycles; `base_delay` should match
    /// `interval` so a healthy cycle and the first retry pace the same.
    pub retry: RetryConfig,
}

impl Default for DrainConfig {
    fn default() -> Self {
        let interval = Duration::from_secs(30);
        Self {
            interval,
            lease_period: Duration::from_secs(600),
            export_timeout: Duration::from_secs(30),
            retry: RetryConfig {
                base_delay: interval,
                max_delay: Duration::from_secs(600),
                ..RetryConfig::default()
            },
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone)]
pub struct DrainStats {
    /// Blobs exported and deleted.
    pub delivered: usize,
    /// Blobs removed because their payload was undecodable or permanently
    /// rejected.
    pub poisoned: usize,
    /// The cycle ended early on a retryable failure.
    pub exporter_down: bool,
}

/// Background task re-exporting persisted batches.
///
/// Each cycle walks the store newest-first: lease (skipping blobs another
/// holder won), read, decode, export. Success deletes the blob; a retryable
/// failure renews the lease to span the coming backoff and ends the cycle,
/// so a downed exporter is probed once per backoff window. If the drainer
/// dies with leases held, the maintenance sweep reclaims them after expiry.
pub struct StorageDrainer {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StorageDrainer {
    pub fn start(
        store: Arc<FileBlobStore>,
        exporter: Arc<dyn Exporter>,
        config: DrainConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drain_loop(store, exporter, config, cancel.child_token()));
        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// One synchronous drain pass over the store, outside any schedule.
    /// This is the same pass the background loop runs.
    pub async fn run_once(
        store: &FileBlobStore,
        exporter: &Arc<dyn Exporter>,
        config: &DrainConfig,
    ) -> DrainStats {
        let mut stats = DrainStats::default();

        for mut blob in store.get_blobs().await {
            if !blob.try_lease(config.lease_period).await {
                // Lost the race or the blob vanished; someone else owns it.
                continue;
            }

            let Some(bytes) = blob.try_read().await else {
                continue;
            };

            let batch = match persist::decode_batch(&bytes) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(blob = %blob.path().display(), "undecodable stored batch, deleting: {e}");
                    blob.try_delete().await;
                    stats.poisoned += 1;
                    continue;
                }
            };

            let batch_id = batch.id().to_string();
            let records = batch.len();
            match tokio::time::timeout(config.export_timeout, exporter.export(batch)).await {
                Ok(ExportResult::Success) => {
                    if blob.try_delete().await {
                        stats.delivered += 1;
                        info!(batch = %batch_id, records, "persisted batch delivered");
                    }
                }
                Ok(ExportResult::FailedNotRetryable) => {
                    warn!(batch = %batch_id, records, "persisted batch permanently rejected, deleting");
                    blob.try_delete().await;
                    stats.poisoned += 1;
                }
                Ok(ExportResult::FailedRetryable) | Err(_) => {
                    // Exporter still down: keep the checkout across our
                    // backoff instead of releasing and re-reading next cycle.
                    blob.try_lease(config.lease_period).await;
                    stats.exporter_down = true;
                    break;
                }
            }
        }

        stats
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for StorageDrainer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drain_loop(
    store: Arc<FileBlobStore>,
    exporter: Arc<dyn Exporter>,
    config: DrainConfig,
    cancel: CancellationToken,
) {
    info!("storage drainer started");
    let mut failed_cycles: u32 = 0;

    loop {
        let wait = if failed_cycles == 0 {
            config.interval
        } else {
            config.retry.backoff_delay(failed_cycles).max(config.interval)
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let stats = StorageDrainer::run_once(&store, &exporter, &config).await;
        if stats.exporter_down {
            failed_cycles = failed_cycles.saturating_add(1);
            debug!(failed_cycles, "drain cycle hit a retryable failure, backing off");
        } else {
            if stats.delivered > 0 {
                info!(delivered = stats.delivered, "drain cycle complete");
            }
            failed_cycles = 0;
        }
    }
    info!("storage drainer stopped");
}
