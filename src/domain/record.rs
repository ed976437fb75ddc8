use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of telemetry a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Span,
    Log,
}

/// A single telemetry record flowing through the pipeline.
///
/// This is the canonical representation from producer input through batching
/// to the exporter. The payload is opaque to the pipeline: nothing after the
/// producer inspects `body` or `attributes`, they are only serialized.
///
/// Records are immutable once created; ownership moves from the producer into
/// the queue and from the queue into exactly one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: RecordKind,
    pub service: String,
    pub body: String,

    // Note: skip_serializing_if is intentionally omitted for bincode compatibility
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl TelemetryRecord {
    pub fn log(service: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: RecordKind::Log,
            service: service.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn span(service: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: RecordKind::Span,
            service: service.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
