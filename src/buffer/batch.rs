use crate::domain::TelemetryRecord;
use std::time::Instant;
use uuid::Uuid;

/// An ordered, bounded list of records assembled by the batch worker.
///
/// Batches are transient: one exists only for the duration of a single export
/// call. Only its serialized bytes ever reach disk.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    records: Vec<TelemetryRecord>,
    created_at: Instant,
}

impl Batch {
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            records,
            created_at: Instant::now(),
        }
    }

    /// Rebuilds a batch under its original id, used when rehydrating a
    /// persisted batch for retry.
    pub fn with_id(id: String, records: Vec<TelemetryRecord>) -> Self {
        Self {
            id,
            records,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TelemetryRecord> {
        self.records
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}
