use crate::buffer::Batch;
use crate::domain::TelemetryRecord;
use crate::export::{ExportResult, Exporter};
use crate::storage::FileBlobStore;
use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Envelope written into a blob: one batch plus enough metadata to rebuild it.
#[derive(Serialize, Deserialize)]
struct StoredBatch {
    id: String,
    records: Vec<TelemetryRecord>,
    stored_at: u64, // Unix timestamp
    compressed: bool,
}

/// Serializes a batch for the blob store, gzipping when `compress` is set.
pub fn encode_batch(batch: &Batch, compress: bool) -> Result<Vec<u8>, PersistError> {
    let stored = StoredBatch {
        id: batch.id().to_string(),
        records: batch.records().to_vec(),
        stored_at: unix_now(),
        compressed: compress,
    };
    let plain = bincode::serde::encode_to_vec(&stored, bincode::config::standard())?;

    if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&plain)?;
        Ok(encoder.finish()?)
    } else {
        Ok(plain)
    }
}

/// Rebuilds a batch from blob bytes, sniffing the gzip magic so compressed
/// and uncompressed blobs coexist in one directory.
pub fn decode_batch(data: &[u8]) -> Result<Batch, PersistError> {
    let plain = if data.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        decompressed
    } else {
        data.to_vec()
    };

    let (stored, _): (StoredBatch, usize) =
        bincode::serde::decode_from_slice(&plain, bincode::config::standard())?;
    Ok(Batch::with_id(stored.id, stored.records))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Exporter wrapper that spills retryable failures into the blob store.
///
/// Success and non-retryable results pass straight through. On a retryable
/// failure the batch is serialized and persisted for the drainer to retry
/// later; if the store refuses (quota, I/O) the batch is dropped and counted.
/// Either way the inner result is returned unchanged, so the processor sees
/// what actually happened.
pub struct DeliveryPipeline {
    inner: Arc<dyn Exporter>,
    store: Arc<FileBlobStore>,
    compress: bool,
    spilled_batches: AtomicU64,
    dropped_batches: AtomicU64,
}

impl DeliveryPipeline {
    pub fn new(inner: Arc<dyn Exporter>, store: Arc<FileBlobStore>, compress: bool) -> Self {
        Self {
            inner,
            store,
            compress,
            spilled_batches: AtomicU64::new(0),
            dropped_batches: AtomicU64::new(0),
        }
    }

    /// Batches persisted for retry.
    pub fn spilled_batches(&self) -> u64 {
        self.spilled_batches.load(Ordering::Relaxed)
    }

    /// Batches lost because they could not be delivered or persisted.
    pub fn dropped_batches(&self) -> u64 {
        self.dropped_batches.load(Ordering::Relaxed)
    }

    async fn spill(&self, batch: &Batch) {
        let bytes = match encode_batch(batch, self.compress) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.dropped_batches.fetch_add(1, Ordering::Relaxed);
                error!(batch = %batch.id(), "failed to encode batch for storage: {e}");
                return;
            }
        };

        if self.store.try_create(&bytes, Duration::ZERO).await.is_some() {
            self.spilled_batches.fetch_add(1, Ordering::Relaxed);
            info!(
                batch = %batch.id(),
                records = batch.len(),
                "batch persisted for retry"
            );
        } else {
            self.dropped_batches.fetch_add(1, Ordering::Relaxed);
            warn!(batch = %batch.id(), records = batch.len(), "storage refused batch, dropping");
        }
    }
}

#[async_trait]
impl Exporter for DeliveryPipeline {
    async fn export(&self, batch: Batch) -> ExportResult {
        let result = self.inner.export(batch.clone()).await;
        match result {
            ExportResult::Success => {}
            ExportResult::FailedRetryable => self.spill(&batch).await,
            ExportResult::FailedNotRetryable => {
                self.dropped_batches.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    async fn shutdown(&self, deadline: Duration) {
        self.inner.shutdown(deadline).await;
    }

    fn name(&self) -> &str {
        "delivery-pipeline"
    }
}
