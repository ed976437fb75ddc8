use crate::domain::TelemetryRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("Invalid queue capacity")]
    InvalidCapacity,
    #[error("Queue is full")]
    Full,
    #[error("Queue is closed")]
    Closed,
}

/// Counter snapshot for the record queue.
#[derive(Debug, Clone)]
pub struct QueueMetrics {
    pub capacity: usize,
    pub len: usize,
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
}

struct QueueState {
    capacity: usize,
    batch_size: usize,
    depth: AtomicUsize,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
    batch_ready: Notify,
}

/// Creates the producer/consumer halves of a record queue.
///
/// `capacity` bounds the number of queued records; `batch_size` is the depth
/// at which the producer side signals `batch_ready` so a waiting consumer can
/// drain early instead of sleeping out its full interval.
pub(crate) fn channel(
    capacity: usize,
    batch_size: usize,
) -> Result<(QueueSender, QueueReceiver), QueueError> {
    if capacity == 0 || batch_size == 0 || batch_size > capacity {
        return Err(QueueError::InvalidCapacity);
    }

    let state = Arc::new(QueueState {
        capacity,
        batch_size,
        depth: AtomicUsize::new(0),
        pushed: AtomicU64::new(0),
        popped: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
        batch_ready: Notify::new(),
    });
    let (tx, rx) = mpsc::unbounded_channel();

    Ok((
        QueueSender {
            tx,
            state: state.clone(),
        },
        QueueReceiver { rx, state },
    ))
}

/// Producer half: safe for unbounded concurrent callers, never blocks.
#[derive(Clone)]
pub(crate) struct QueueSender {
    tx: UnboundedSender<TelemetryRecord>,
    state: Arc<QueueState>,
}

impl QueueSender {
    /// Appends a record, or drops it when the queue is at capacity.
    ///
    /// The depth check races with concurrent pushers; the counter is
    /// best-effort by contract, so a slight overshoot is tolerated.
    pub fn push(&self, record: TelemetryRecord) -> Result<(), QueueError> {
        let depth = self.state.depth.load(Ordering::Acquire);
        if depth >= self.state.capacity {
            self.state.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(QueueError::Full);
        }

        if self.tx.send(record).is_err() {
            self.state.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(QueueError::Closed);
        }

        self.state.pushed.fetch_add(1, Ordering::Relaxed);
        let new_depth = self.state.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if new_depth >= self.state.batch_size {
            self.state.batch_ready.notify_one();
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.depth.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            capacity: self.state.capacity,
            len: self.state.depth.load(Ordering::Relaxed),
            pushed: self.state.pushed.load(Ordering::Relaxed),
            popped: self.state.popped.load(Ordering::Relaxed),
            dropped: self.state.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Consumer half, owned by the single batch worker.
pub(crate) struct QueueReceiver {
    rx: UnboundedReceiver<TelemetryRecord>,
    state: Arc<QueueState>,
}

impl QueueReceiver {
    /// Waits up to `wait` for the oldest available record.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<TelemetryRecord> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(record)) => {
                self.on_pop();
                Some(record)
            }
            _ => None,
        }
    }

    /// Removes the oldest available record without waiting.
    pub fn try_pop(&mut self) -> Option<TelemetryRecord> {
        match self.rx.try_recv() {
            Ok(record) => {
                self.on_pop();
                Some(record)
            }
            Err(_) => None,
        }
    }

    /// Resolves once a producer has signalled a full batch is pending.
    pub async fn batch_ready(&self) {
        self.state.batch_ready.notified().await;
    }

    pub fn len(&self) -> usize {
        self.state.depth.load(Ordering::Relaxed)
    }

    fn on_pop(&self) {
        self.state.popped.fetch_add(1, Ordering::Relaxed);
        // Guard against underflow when the depth counter lost a race
        let current = self.state.depth.load(Ordering::Relaxed);
        if current > 0 {
            self.state.depth.fetch_sub(1, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TelemetryRecord;

    fn record(i: usize) -> TelemetryRecord {
        TelemetryRecord::log("test", format!("record-{i}"))
    }

    #[test]
    fn rejects_invalid_capacity() {
        assert!(channel(0, 1).is_err());
        assert!(channel(10, 0).is_err());
        assert!(channel(10, 11).is_err());
    }

    #[test]
    fn drops_when_full() {
        let (tx, _rx) = channel(3, 3).unwrap();
        for i in 0..3 {
            tx.push(record(i)).unwrap();
        }
        assert_eq!(tx.push(record(3)), Err(QueueError::Full));
        let metrics = tx.metrics();
        assert_eq!(metrics.pushed, 3);
        assert_eq!(metrics.dropped, 1);
        assert_eq!(metrics.len, 3);
    }

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (tx, mut rx) = channel(16, 4).unwrap();
        for i in 0..5 {
            tx.push(record(i)).unwrap();
        }
        for i in 0..5 {
            let popped = rx.try_pop().expect("record available");
            assert_eq!(popped.body, format!("record-{i}"));
        }
        assert!(rx.try_pop().is_none());
        assert_eq!(tx.metrics().popped, 5);
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_empty() {
        let (_tx, mut rx) = channel(4, 2).unwrap();
        let got = rx.recv_timeout(Duration::from_millis(10)).await;
        assert!(got.is_none());
    }
}
