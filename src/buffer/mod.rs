pub mod batch;
pub mod error;
pub mod metrics;
pub mod queue;

pub use batch::{BatchAssembler, FlushTrigger, LogBatch, PendingBatch, RetrySplit, SDK_VERSION};
pub use error::BufferError;
pub use metrics::BufferMetrics;
pub use queue::{EntryBuffer, QueuedEntry};
