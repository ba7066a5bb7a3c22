pub mod circuit;
pub mod metrics;
pub mod retry;

pub use circuit::CircuitBreaker;
pub use metrics::{LoggerStats, StatsSnapshot};
pub use retry::{DropReason, RetryPolicy, Settlement};
