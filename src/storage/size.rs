use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::fs;
use tracing::warn;

/// Approximate running total of bytes occupied by one storage directory.
///
/// Creates and deletes adjust the counter by their deltas; the value is exact
/// only immediately after [`recount`](Self::recount). Drift in between (from
/// crashes, racing writers, or files touched out of band) is tolerated and
/// self-heals on the next recount, which the maintenance sweep runs
/// periodically.
#[derive(Debug)]
pub struct DirectorySizeTracker {
    directory: PathBuf,
    bytes: AtomicI64,
}

impl DirectorySizeTracker {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            bytes: AtomicI64::new(0),
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed).max(0) as u64
    }

    pub fn add(&self, delta: u64) {
        self.bytes.fetch_add(delta as i64, Ordering::Relaxed);
    }

    pub fn sub(&self, delta: u64) {
        self.bytes.fetch_sub(delta as i64, Ordering::Relaxed);
    }

    /// Replaces the counter with an exact scan of the directory.
    ///
    /// On scan failure the previous approximation is kept.
    pub async fn recount(&self) -> u64 {
        match Self::scan(&self.directory).await {
            Ok(total) => {
                self.bytes.store(total as i64, Ordering::Relaxed);
                total
            }
            Err(e) => {
                warn!(directory = %self.directory.display(), "size recount failed: {e}");
                self.bytes()
            }
        }
    }

    async fn scan(directory: &Path) -> std::io::Result<u64> {
        let mut total = 0u64;
        let mut entries = fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }
}
