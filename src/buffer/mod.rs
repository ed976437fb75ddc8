pub mod batch;
pub mod metrics;
pub mod processor;
pub mod queue;

pub use batch::Batch;
pub use metrics::{ProcessorMetrics, ProcessorSnapshot};
pub use processor::{BatchProcessor, ProcessorConfig};
pub use queue::{QueueError, QueueMetrics};
