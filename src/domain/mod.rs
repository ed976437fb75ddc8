pub mod record;

pub use record::{RecordKind, TelemetryRecord};
