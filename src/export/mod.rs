pub mod http;
pub mod memory;

pub use http::{ExporterError, HttpExporter, HttpExporterConfig};
pub use memory::InMemoryExporter;

use crate::buffer::Batch;
use async_trait::async_trait;
use std::time::Duration;

/// Three-way outcome of an export call.
///
/// The processor never inspects *why* an export failed; the distinction only
/// matters to the delivery layer deciding whether the batch is worth
/// persisting for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportResult {
    Success,
    FailedRetryable,
    FailedNotRetryable,
}

impl ExportResult {
    pub fn is_success(self) -> bool {
        self == ExportResult::Success
    }

    pub fn is_retryable(self) -> bool {
        self == ExportResult::FailedRetryable
    }
}

/// Destination for assembled batches.
///
/// Implementations report failure through the returned [`ExportResult`] and
/// must not panic; the worker additionally bounds every call with its export
/// timeout.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, batch: Batch) -> ExportResult;

    /// Flush and release resources. `deadline` is whatever remains of the
    /// caller's shutdown deadline.
    async fn shutdown(&self, _deadline: Duration) {}

    /// Exporter name for logs.
    fn name(&self) -> &str;
}
