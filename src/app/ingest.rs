use crate::buffer::BatchProcessor;
use crate::domain::TelemetryRecord;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feeds the processor with NDJSON records read from stdin.
///
/// This is the binary's stand-in for instrumentation hooks: anything that can
/// pipe one JSON record per line becomes a producer. Malformed lines are
/// skipped, and EOF or cancellation ends the task.
pub async fn run_stdin_ingest(processor: Arc<BatchProcessor>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("reading telemetry records from stdin");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<TelemetryRecord>(&line) {
                        Ok(record) => processor.submit(record),
                        Err(e) => debug!("skipping malformed record: {e}"),
                    }
                }
                Ok(None) => {
                    info!("input stream closed");
                    break;
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    }
}
