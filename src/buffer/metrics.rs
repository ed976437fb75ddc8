use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for the batching processor, shared with its worker task.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    pub(crate) exported_records: AtomicU64,
    pub(crate) exported_batches: AtomicU64,
    pub(crate) failed_batches: AtomicU64,
}

/// Point-in-time view over processor and queue counters.
#[derive(Debug, Clone)]
pub struct ProcessorSnapshot {
    /// Records accepted or dropped at the queue boundary.
    pub received: u64,
    /// Records dropped because the queue was at capacity.
    pub dropped: u64,
    /// Records currently queued.
    pub pending: usize,
    /// Records in batches the exporter acknowledged.
    pub exported_records: u64,
    /// Batches the exporter acknowledged.
    pub exported_batches: u64,
    /// Batches that failed or timed out.
    pub failed_batches: u64,
}

impl ProcessorMetrics {
    pub(crate) fn record_success(&self, records: usize) {
        self.exported_records
            .fetch_add(records as u64, Ordering::Relaxed);
        self.exported_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }
}
