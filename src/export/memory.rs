use super::{ExportResult, Exporter};
use crate::buffer::Batch;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Exporter that keeps delivered batches in memory.
///
/// Results can be scripted per call with [`with_results`](Self::with_results);
/// once the script is exhausted every export succeeds. Intended for tests and
/// local debugging.
#[derive(Default)]
pub struct InMemoryExporter {
    delivered: Mutex<Vec<Batch>>,
    scripted: Mutex<VecDeque<ExportResult>>,
    attempts: AtomicU64,
    shutdown_called: AtomicBool,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: impl IntoIterator<Item = ExportResult>) -> Self {
        Self {
            scripted: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push_result(&self, result: ExportResult) {
        self.scripted.lock().expect("lock poisoned").push_back(result);
    }

    /// Batches that exported successfully, in delivery order.
    pub fn delivered(&self) -> Vec<Batch> {
        self.delivered.lock().expect("lock poisoned").clone()
    }

    /// Total records across successfully delivered batches.
    pub fn delivered_records(&self) -> usize {
        self.delivered
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(Batch::len)
            .sum()
    }

    /// Export calls made, regardless of outcome.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn was_shutdown(&self) -> bool {
        self.shutdown_called.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, batch: Batch) -> ExportResult {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let result = self
            .scripted
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(ExportResult::Success);
        if result.is_success() {
            self.delivered.lock().expect("lock poisoned").push(batch);
        }
        result
    }

    async fn shutdown(&self, _deadline: Duration) {
        self.shutdown_called.store(true, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
