use serde::Serialize;

/// Point-in-time view of an [`EntryBuffer`](super::EntryBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferMetrics {
    pub capacity: usize,
    pub len: usize,
    pub peak_len: usize,
    pub pushed: u64,
    pub drained: u64,
    pub requeued: u64,
    pub evicted: u64,
}

