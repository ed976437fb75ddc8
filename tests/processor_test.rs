use std::sync::Arc;
use std::time::Duration;
use telemetry_relay::buffer::{BatchProcessor, ProcessorConfig};
use telemetry_relay::domain::TelemetryRecord;
use telemetry_relay::export::InMemoryExporter;

fn record(i: usize) -> TelemetryRecord {
    TelemetryRecord::log("test-service", format!("record-{i}"))
}

fn config(queue: usize, batch: usize, delay_ms: u64) -> ProcessorConfig {
    ProcessorConfig {
        max_queue_size: queue,
        max_export_batch_size: batch,
        scheduled_delay: Duration::from_millis(delay_ms),
        export_timeout: Duration::from_secs(5),
    }
}

/// Polls until `predicate` holds or two seconds pass.
async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(predicate(), "condition not reached within 2s");
}

#[tokio::test]
async fn splits_backlog_into_bounded_batches() {
    let exporter = Arc::new(InMemoryExporter::new());
    let processor = BatchProcessor::new(exporter.clone(), config(100, 5, 100)).unwrap();

    // 2N+1 records land in the queue before the worker gets a chance to
    // drain (submissions are synchronous and the worker task has not been
    // polled yet).
    for i in 0..11 {
        processor.submit(record(i));
    }

    wait_until(|| exporter.delivered_records() == 11).await;

    let sizes: Vec<usize> = exporter.delivered().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![5, 5, 1]);

    // Per-producer FIFO carries through to batch contents.
    let bodies: Vec<String> = exporter
        .delivered()
        .iter()
        .flat_map(|b| b.records().iter().map(|r| r.body.clone()))
        .collect();
    let expected: Vec<String> = (0..11).map(|i| format!("record-{i}")).collect();
    assert_eq!(bodies, expected);

    processor.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn overflow_drops_and_counts_excess_records() {
    let exporter = Arc::new(InMemoryExporter::new());
    let processor = BatchProcessor::new(exporter.clone(), config(10, 5, 50)).unwrap();

    for i in 0..13 {
        processor.submit(record(i));
    }

    // The three over-capacity submissions were dropped at the queue boundary.
    let metrics = processor.metrics();
    assert_eq!(metrics.dropped, 3);
    assert_eq!(metrics.received, 13);

    wait_until(|| exporter.delivered_records() == 10).await;
    assert_eq!(processor.metrics().dropped, 3);

    processor.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn shutdown_drains_everything_within_deadline() {
    let exporter = Arc::new(InMemoryExporter::new());
    // Long scheduled delay: the drain must not depend on the timer.
    let processor = BatchProcessor::new(exporter.clone(), config(100, 10, 10_000)).unwrap();

    for i in 0..25 {
        processor.submit(record(i));
    }

    let pending = processor.shutdown(Duration::from_secs(5)).await;
    assert_eq!(pending, 0);
    assert_eq!(exporter.delivered_records(), 25);
    assert!(exporter.was_shutdown());
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let exporter = Arc::new(InMemoryExporter::new());
    let processor = BatchProcessor::new(exporter.clone(), config(100, 10, 10_000)).unwrap();

    processor.submit(record(0));
    assert_eq!(processor.shutdown(Duration::from_secs(5)).await, 0);

    let attempts = exporter.attempts();
    assert_eq!(processor.shutdown(Duration::from_secs(5)).await, 0);
    assert_eq!(exporter.attempts(), attempts);
}

#[tokio::test]
async fn submissions_after_shutdown_are_ignored() {
    let exporter = Arc::new(InMemoryExporter::new());
    let processor = BatchProcessor::new(exporter.clone(), config(100, 10, 50)).unwrap();

    processor.shutdown(Duration::from_secs(1)).await;

    processor.submit(record(0));
    assert_eq!(processor.metrics().received, 0);
    assert_eq!(processor.pending(), 0);
}

#[tokio::test]
async fn light_load_flushes_on_the_scheduled_delay() {
    let exporter = Arc::new(InMemoryExporter::new());
    // Batch size far above what we submit: only the timer can flush.
    let processor = BatchProcessor::new(exporter.clone(), config(100, 100, 50)).unwrap();

    for i in 0..3 {
        processor.submit(record(i));
    }

    wait_until(|| exporter.delivered_records() == 3).await;
    let sizes: Vec<usize> = exporter.delivered().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3]);

    processor.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn export_failures_do_not_kill_the_worker() {
    use telemetry_relay::export::ExportResult;

    let exporter = Arc::new(InMemoryExporter::with_results([
        ExportResult::FailedRetryable,
        ExportResult::FailedNotRetryable,
    ]));
    let processor = BatchProcessor::new(exporter.clone(), config(100, 5, 50)).unwrap();

    // First two batches fail, the third succeeds; the worker must survive all.
    for i in 0..5 {
        processor.submit(record(i));
    }
    wait_until(|| exporter.attempts() >= 1).await;
    for i in 5..10 {
        processor.submit(record(i));
    }
    wait_until(|| exporter.attempts() >= 2).await;
    for i in 10..15 {
        processor.submit(record(i));
    }
    wait_until(|| exporter.delivered_records() == 5).await;

    let metrics = processor.metrics();
    assert_eq!(metrics.failed_batches, 2);
    assert_eq!(metrics.exported_batches, 1);

    processor.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing_under_capacity() {
    let exporter = Arc::new(InMemoryExporter::new());
    let processor = Arc::new(BatchProcessor::new(exporter.clone(), config(10_000, 256, 50)).unwrap());

    let mut producers = Vec::new();
    for p in 0..8 {
        let processor = processor.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..500 {
                processor.submit(record(p * 1000 + i));
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let pending = processor.shutdown(Duration::from_secs(10)).await;
    assert_eq!(pending, 0);
    assert_eq!(exporter.delivered_records(), 8 * 500);
    assert_eq!(processor.metrics().dropped, 0);
}
