use super::filename;
use super::size::DirectorySizeTracker;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One persisted serialized batch, addressed by its current file path.
///
/// Every operation catches its own I/O errors, logs them, and reports failure
/// as a value; no error type crosses this boundary. The directory is shared
/// with other processes, so all mutation goes through file-system-atomic
/// renames; losing a rename race is an ordinary `false`, not a fault.
#[derive(Debug, Clone)]
pub struct FileBlob {
    path: PathBuf,
    tracker: Arc<DirectorySizeTracker>,
}

impl FileBlob {
    pub(crate) fn new(path: PathBuf, tracker: Arc<DirectorySizeTracker>) -> Self {
        Self { path, tracker }
    }

    /// Current on-disk path; changes as the blob is leased and released.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full committed content.
    pub async fn try_read(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(blob = %self.path.display(), "blob read failed: {e}");
                None
            }
        }
    }

    /// Writes `data` to a `.tmp` sibling, fsyncs, then atomically renames to
    /// the committed name, or, when `lease_period` is non-zero, directly to
    /// the leased name so the blob is born reserved for its writer.
    pub async fn try_write(&mut self, data: &[u8], lease_period: Duration) -> bool {
        match self.write_inner(data, lease_period).await {
            Ok(()) => {
                self.tracker.add(data.len() as u64);
                true
            }
            Err(e) => {
                warn!(blob = %self.path.display(), "blob write failed: {e}");
                false
            }
        }
    }

    async fn write_inner(&mut self, data: &[u8], lease_period: Duration) -> io::Result<()> {
        let file_name = self.file_name()?;
        let tmp_path = self.path.with_file_name(format!("{file_name}{}", filename::TMP_EXT));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        let final_path = if lease_period.is_zero() {
            self.path.clone()
        } else {
            let deadline = deadline_after(lease_period);
            self.path
                .with_file_name(filename::lease_name(file_name, deadline))
        };

        fs::rename(&tmp_path, &final_path).await?;
        self.path = final_path;
        Ok(())
    }

    /// Takes or renews the exclusive time-boxed checkout on this blob.
    ///
    /// The rename is the lock: of any number of concurrent callers exactly
    /// one observes success. A renewal strips the previous deadline suffix
    /// first, so suffixes never accumulate.
    pub async fn try_lease(&mut self, period: Duration) -> bool {
        let file_name = match self.file_name() {
            Ok(name) => name,
            Err(e) => {
                warn!(blob = %self.path.display(), "blob lease failed: {e}");
                return false;
            }
        };
        let committed = filename::strip_lease(file_name);
        let deadline = deadline_after(period);
        let leased_path = self
            .path
            .with_file_name(filename::lease_name(committed, deadline));

        match fs::rename(&self.path, &leased_path).await {
            Ok(()) => {
                self.path = leased_path;
                true
            }
            Err(e) => {
                // Typically a lost race: another holder renamed the file first.
                debug!(blob = %self.path.display(), "blob lease failed: {e}");
                false
            }
        }
    }

    /// Deletes the blob and credits its size back to the tracker.
    pub async fn try_delete(&self) -> bool {
        let size = match fs::metadata(&self.path).await {
            Ok(metadata) => Some(metadata.len()),
            Err(_) => None,
        };

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                if let Some(size) = size {
                    self.tracker.sub(size);
                }
                true
            }
            Err(e) => {
                warn!(blob = %self.path.display(), "blob delete failed: {e}");
                false
            }
        }
    }

    fn file_name(&self) -> io::Result<&str> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no valid file name"))
    }
}

/// `now + period` without the overflow panic of `DateTime + Duration`.
pub(crate) fn deadline_after(period: Duration) -> DateTime<Utc> {
    let millis = period.as_millis().min(i64::MAX as u128) as i64;
    Utc::now()
        .checked_add_signed(chrono::Duration::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
