use super::blob::FileBlob;
use super::filename;
use super::size::DirectorySizeTracker;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Quota for the directory; `try_create` refuses once reached.
    pub max_size_bytes: u64,
    /// Period of the maintenance sweep.
    pub maintenance_interval: Duration,
    /// Blobs older than this are given up on and deleted by the sweep.
    pub retention_period: Duration,
    /// `.tmp` files older than this are considered abandoned writes.
    pub write_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/tmp/telemetry-relay/storage"),
            max_size_bytes: 50 * 1024 * 1024,
            maintenance_interval: Duration::from_secs(120),
            retention_period: Duration::from_secs(172_800),
            write_timeout: Duration::from_secs(60),
        }
    }
}

/// File-system-backed, lease-based persistent queue of serialized batches.
///
/// One flat directory per store. All mutation (create, lease, delete) relies
/// on atomic renames so the directory can be shared across processes; the
/// size tracker is the only in-process shared state. A periodic maintenance
/// sweep reclaims expired leases, drops retained-past-deadline blobs, removes
/// abandoned `.tmp` files, and recounts the directory size.
pub struct FileBlobStore {
    config: StorageConfig,
    tracker: Arc<DirectorySizeTracker>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl FileBlobStore {
    /// Creates the directory if needed, takes an initial size count, and
    /// starts the maintenance task.
    pub async fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.directory).await?;

        let tracker = Arc::new(DirectorySizeTracker::new(config.directory.clone()));
        tracker.recount().await;

        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(maintenance_loop(
            config.clone(),
            tracker.clone(),
            cancel.child_token(),
        ));
        info!(directory = %config.directory.display(), "blob store opened");

        Ok(Self {
            config,
            tracker,
            cancel,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Persists `data` as a new blob, leased to the caller when
    /// `lease_period` is non-zero.
    ///
    /// Returns `None` when the quota is reached or the write fails. The quota
    /// check is best-effort: it races with concurrent writers, and a slight
    /// overshoot is corrected by the next sweep recount rather than locked
    /// against.
    pub async fn try_create(&self, data: &[u8], lease_period: Duration) -> Option<FileBlob> {
        let used = self.tracker.bytes();
        if used.saturating_add(data.len() as u64) > self.config.max_size_bytes {
            warn!(
                used,
                quota = self.config.max_size_bytes,
                "storage quota reached, refusing new blob"
            );
            return None;
        }

        let name = filename::unique_blob_name(Utc::now());
        let mut blob = FileBlob::new(self.config.directory.join(name), self.tracker.clone());
        if blob.try_write(data, lease_period).await {
            Some(blob)
        } else {
            None
        }
    }

    /// Snapshot of committed blobs, newest first by encoded timestamp,
    /// excluding blobs already past the retention deadline.
    pub async fn get_blobs(&self) -> Vec<FileBlob> {
        let retention_deadline = deadline_before(self.config.retention_period);

        let mut names = list_file_names(&self.config.directory).await;
        names.retain(|name| {
            name.ends_with(filename::BLOB_EXT)
                && filename::blob_timestamp(name).is_some_and(|t| t >= retention_deadline)
        });
        names.sort_unstable_by(|a, b| b.cmp(a));

        names
            .into_iter()
            .map(|name| FileBlob::new(self.config.directory.join(name), self.tracker.clone()))
            .collect()
    }

    /// The newest available blob, if any.
    pub async fn try_get(&self) -> Option<FileBlob> {
        self.get_blobs().await.into_iter().next()
    }

    /// Runs one maintenance pass immediately.
    pub async fn sweep(&self) {
        sweep_directory(&self.config, &self.tracker).await;
    }

    /// Current approximate directory size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.tracker.bytes()
    }

    /// Forces an exact recount of the directory size.
    pub async fn recount(&self) -> u64 {
        self.tracker.recount().await
    }

    /// Stops the maintenance task deterministically.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let sweeper = self.sweeper.lock().expect("lock poisoned").take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }
    }
}

impl Drop for FileBlobStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn maintenance_loop(
    config: StorageConfig,
    tracker: Arc<DirectorySizeTracker>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.maintenance_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the store was just recounted, so the
    // first real sweep happens one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => sweep_directory(&config, &tracker).await,
        }
    }
}

/// One maintenance pass. Per-file failures are logged and skipped; the pass
/// never aborts early and always ends with a size recount.
async fn sweep_directory(config: &StorageConfig, tracker: &Arc<DirectorySizeTracker>) {
    let now = Utc::now();
    let retention_deadline = deadline_before(config.retention_period);
    let timeout_deadline = deadline_before(config.write_timeout);

    let mut names = list_file_names(&config.directory).await;
    names.sort_unstable_by(|a, b| b.cmp(a));

    for name in names {
        let path = config.directory.join(&name);

        if name.ends_with(filename::TMP_EXT) {
            // A writer crashed mid-write; unreadable names count as expired.
            if filename::blob_timestamp(&name).is_none_or(|t| t < timeout_deadline) {
                if remove_file(&path).await {
                    debug!(file = %name, "removed abandoned temporary file");
                }
            }
        } else if name.ends_with(filename::LOCK_EXT) {
            match filename::lease_deadline(&name) {
                Some(deadline) if deadline > now => {} // lease still held
                _ => {
                    // Abandoned lease: return the blob to the retry pool.
                    let committed = config.directory.join(filename::strip_lease(&name));
                    match fs::rename(&path, &committed).await {
                        Ok(()) => debug!(file = %name, "released expired lease"),
                        Err(e) => warn!(file = %name, "lease release failed: {e}"),
                    }
                }
            }
        } else if name.ends_with(filename::BLOB_EXT)
            && filename::blob_timestamp(&name).is_none_or(|t| t < retention_deadline)
            && remove_file(&path).await
        {
            debug!(file = %name, "deleted blob past retention");
        }
    }

    // Cheaper and more robust than threading exact deltas through every
    // deletion above.
    tracker.recount().await;
}

async fn list_file_names(directory: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %directory.display(), "directory listing failed: {e}");
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(directory = %directory.display(), "directory listing failed: {e}");
                break;
            }
        }
    }
    names
}

async fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) => {
            warn!(file = %path.display(), "delete failed: {e}");
            false
        }
    }
}

/// `now - period`, saturating instead of panicking on overflow.
fn deadline_before(period: Duration) -> DateTime<Utc> {
    let millis = period.as_millis().min(i64::MAX as u128) as i64;
    Utc::now()
        .checked_sub_signed(chrono::Duration::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
