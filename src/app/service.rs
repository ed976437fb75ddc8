use super::config::{Config, ConfigError};
use super::ingest;
use crate::buffer::{BatchProcessor, ProcessorSnapshot, QueueError};
use crate::export::{Exporter, ExporterError, HttpExporter};
use crate::reliability::{DeliveryPipeline, StorageDrainer};
use crate::storage::{FileBlobStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Exporter error: {0}")]
    Exporter(#[from] ExporterError),
}

/// Owns every pipeline component and tears them down in order.
///
/// Wiring: stdin ingest → batch processor → delivery pipeline → HTTP
/// exporter, with the blob store and its drainer on the retry path. Shutdown
/// stops the producer first, drains the processor within its deadline, then
/// cancels the drainer and the store's maintenance task.
pub struct ServiceManager {
    config: Config,
    processor: Arc<BatchProcessor>,
    store: Arc<FileBlobStore>,
    drainer: StorageDrainer,
    ingest_cancel: CancellationToken,
    ingest: Option<JoinHandle<()>>,
}

impl ServiceManager {
    pub async fn start(config: Config) -> Result<Self, ServiceError> {
        info!(endpoint = %config.endpoint, "starting telemetry-relay components");

        let exporter: Arc<dyn Exporter> = Arc::new(HttpExporter::new(config.exporter_config())?);
        let store = Arc::new(FileBlobStore::new(config.storage_config()).await?);
        let pipeline = Arc::new(DeliveryPipeline::new(
            exporter.clone(),
            store.clone(),
            config.enable_compression,
        ));
        let processor = Arc::new(BatchProcessor::new(pipeline, config.processor_config())?);
        let drainer = StorageDrainer::start(store.clone(), exporter, config.drain_config());

        let ingest_cancel = CancellationToken::new();
        let ingest = tokio::spawn(ingest::run_stdin_ingest(
            processor.clone(),
            ingest_cancel.child_token(),
        ));

        Ok(Self {
            config,
            processor,
            store,
            drainer,
            ingest_cancel,
            ingest: Some(ingest),
        })
    }

    pub fn processor(&self) -> &Arc<BatchProcessor> {
        &self.processor
    }

    pub fn metrics(&self) -> ProcessorSnapshot {
        self.processor.metrics()
    }

    /// Ordered teardown. Returns the number of records abandoned in the
    /// queue, zero on a complete drain.
    pub async fn shutdown(mut self) -> usize {
        info!("stopping telemetry-relay components");

        self.ingest_cancel.cancel();
        if let Some(ingest) = self.ingest.take() {
            let _ = ingest.await;
        }

        let pending = self.processor.shutdown(self.config.shutdown_timeout()).await;
        self.drainer.shutdown().await;
        self.store.shutdown().await;

        if pending > 0 {
            warn!(pending, "shutdown completed with records unexported");
        }
        pending
    }
}
