use super::batch::Batch;
use super::metrics::{ProcessorMetrics, ProcessorSnapshot};
use super::queue::{self, QueueError, QueueReceiver, QueueSender};
use crate::domain::TelemetryRecord;
use crate::export::{ExportResult, Exporter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Records the queue will hold before dropping new ones.
    pub max_queue_size: usize,
    /// Upper bound on records per export call.
    pub max_export_batch_size: usize,
    /// Maximum interval between export cycles under light load.
    pub scheduled_delay: Duration,
    /// Bound on a single export call, independent of the shutdown deadline.
    pub export_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_secs(5),
            export_timeout: Duration::from_secs(30),
        }
    }
}

// Processor lifecycle: Running -> Draining -> Stopped, never backwards.
const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const STOPPED: u8 = 2;

/// The batching processor: a bounded queue in front of a single background
/// worker that assembles size/time-bounded batches and hands them to the
/// exporter.
///
/// Producers call [`submit`](Self::submit) from any number of tasks or
/// threads; it never blocks and never fails outward. When the queue is at
/// capacity records are dropped and counted. A failing exporter is logged and
/// never unwinds into the worker loop.
pub struct BatchProcessor {
    sender: QueueSender,
    exporter: Arc<dyn Exporter>,
    config: ProcessorConfig,
    metrics: Arc<ProcessorMetrics>,
    state: AtomicU8,
    cancel: CancellationToken,
    drain_deadline: Arc<OnceLock<Instant>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BatchProcessor {
    /// Starts the processor and its worker task. Must be called from within a
    /// tokio runtime.
    pub fn new(exporter: Arc<dyn Exporter>, config: ProcessorConfig) -> Result<Self, QueueError> {
        let (sender, receiver) = queue::channel(config.max_queue_size, config.max_export_batch_size)?;
        let metrics = Arc::new(ProcessorMetrics::default());
        let cancel = CancellationToken::new();
        let drain_deadline = Arc::new(OnceLock::new());

        let worker = Worker {
            receiver,
            exporter: exporter.clone(),
            config: config.clone(),
            metrics: metrics.clone(),
            cancel: cancel.child_token(),
            drain_deadline: drain_deadline.clone(),
        };
        let handle = tokio::spawn(worker.run());
        info!(exporter = exporter.name(), "batch worker started");

        Ok(Self {
            sender,
            exporter,
            config,
            metrics,
            state: AtomicU8::new(RUNNING),
            cancel,
            drain_deadline,
            worker: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    /// Hands one record to the pipeline.
    ///
    /// Submissions arriving while the processor is draining or stopped are
    /// silently ignored. A full queue drops the record and increments the
    /// dropped counter; the producer is never blocked either way.
    pub fn submit(&self, record: TelemetryRecord) {
        if self.state.load(Ordering::Acquire) != RUNNING {
            return;
        }
        let _ = self.sender.push(record);
    }

    /// Records currently queued.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn metrics(&self) -> ProcessorSnapshot {
        let queue = self.sender.metrics();
        ProcessorSnapshot {
            received: queue.pushed + queue.dropped,
            dropped: queue.dropped,
            pending: queue.len,
            exported_records: self.metrics.exported_records.load(Ordering::Relaxed),
            exported_batches: self.metrics.exported_batches.load(Ordering::Relaxed),
            failed_batches: self.metrics.failed_batches.load(Ordering::Relaxed),
        }
    }

    /// Drains the queue and stops the worker, then forwards shutdown to the
    /// exporter with whatever part of the deadline is left.
    ///
    /// Idempotent: only the first caller drains; later calls return
    /// immediately. Returns the number of records abandoned in the queue,
    /// zero on a complete drain.
    pub async fn shutdown(&self, deadline: Duration) -> usize {
        if self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.sender.len();
        }

        let deadline_at = Instant::now() + deadline;
        let _ = self.drain_deadline.set(deadline_at);
        self.cancel.cancel();

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                warn!("batch worker did not finish draining before the shutdown deadline");
            }
        }

        let remaining = deadline_at.saturating_duration_since(Instant::now());
        self.exporter.shutdown(remaining).await;
        self.state.store(STOPPED, Ordering::Release);

        let pending = self.sender.len();
        if pending > 0 {
            warn!(pending, "records abandoned at shutdown");
        } else {
            info!("batch processor stopped");
        }
        pending
    }
}

impl Drop for BatchProcessor {
    fn drop(&mut self) {
        // A processor dropped without shutdown() must not leave its worker
        // spinning; the worker drains what it can and exits.
        self.cancel.cancel();
    }
}

struct Worker {
    receiver: QueueReceiver,
    exporter: Arc<dyn Exporter>,
    config: ProcessorConfig,
    metrics: Arc<ProcessorMetrics>,
    cancel: CancellationToken,
    drain_deadline: Arc<OnceLock<Instant>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let cycle_start = Instant::now();

            // Only wait when the queue holds less than a full batch;
            // under heavy load keep draining continuously.
            let first = if self.receiver.len() >= self.config.max_export_batch_size {
                self.receiver.try_pop()
            } else {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    record = self.receiver.recv_timeout(self.config.scheduled_delay) => record,
                }
            };

            if let Some(record) = first {
                let records = self.collect(record);
                self.export(records).await;
            }

            // Pace the next cycle under light load; a pending full batch or
            // shutdown interrupts the wait.
            if self.receiver.len() < self.config.max_export_batch_size {
                let elapsed = cycle_start.elapsed();
                if elapsed < self.config.scheduled_delay {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = self.receiver.batch_ready() => {}
                        _ = tokio::time::sleep(self.config.scheduled_delay - elapsed) => {}
                    }
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        self.drain().await;
    }

    /// Fills a batch starting from `first` without waiting.
    fn collect(&mut self, first: TelemetryRecord) -> Vec<TelemetryRecord> {
        let mut records = Vec::with_capacity(self.config.max_export_batch_size);
        records.push(first);
        while records.len() < self.config.max_export_batch_size {
            match self.receiver.try_pop() {
                Some(record) => records.push(record),
                None => break,
            }
        }
        records
    }

    async fn export(&self, records: Vec<TelemetryRecord>) {
        let count = records.len();
        let batch = Batch::new(records);
        let batch_id = batch.id().to_string();

        match tokio::time::timeout(self.config.export_timeout, self.exporter.export(batch)).await {
            Ok(ExportResult::Success) => {
                self.metrics.record_success(count);
                debug!(batch = %batch_id, records = count, "batch exported");
            }
            Ok(ExportResult::FailedRetryable) => {
                self.metrics.record_failure();
                warn!(batch = %batch_id, records = count, "export failed (retryable)");
            }
            Ok(ExportResult::FailedNotRetryable) => {
                self.metrics.record_failure();
                warn!(batch = %batch_id, records = count, "export failed (not retryable)");
            }
            Err(_) => {
                self.metrics.record_failure();
                warn!(batch = %batch_id, records = count, "export timed out");
            }
        }
    }

    /// Exports until the queue is empty or the shutdown deadline passes.
    async fn drain(&mut self) {
        let deadline = self.drain_deadline.get().copied();
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(
                        pending = self.receiver.len(),
                        "shutdown deadline reached with records still queued"
                    );
                    break;
                }
            }
            let Some(first) = self.receiver.try_pop() else {
                break;
            };
            let records = self.collect(first);
            self.export(records).await;
        }
    }
}
