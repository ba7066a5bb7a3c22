use super::retry::DropReason;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every handle of one logger.
#[derive(Debug, Default)]
pub struct LoggerStats {
    enqueued: AtomicU64,
    delivered_entries: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    retries: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_retries_exhausted: AtomicU64,
    dropped_rejected: AtomicU64,
    dropped_unauthorized: AtomicU64,
    dropped_closed: AtomicU64,
    dropped_shutdown_timeout: AtomicU64,
}

/// Point-in-time view of [`LoggerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub delivered_entries: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    /// Entries requeued after a retryable failure.
    pub retries: u64,
    pub dropped_overflow: u64,
    pub dropped_retries_exhausted: u64,
    pub dropped_rejected: u64,
    pub dropped_unauthorized: u64,
    pub dropped_closed: u64,
    pub dropped_shutdown_timeout: u64,
    /// Entries waiting in the buffer when the snapshot was taken.
    pub buffered: u64,
}

impl StatsSnapshot {
    pub fn dropped_total(&self) -> u64 {
        self.dropped_overflow
            + self.dropped_retries_exhausted
            + self.dropped_rejected
            + self.dropped_unauthorized
            + self.dropped_closed
            + self.dropped_shutdown_timeout
    }
}

impl LoggerStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, entries: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.delivered_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_failed_batch(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries(&self, entries: usize) {
        self.retries.fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, reason: DropReason, entries: usize) {
        if entries == 0 {
            return;
        }
        let counter = match reason {
            DropReason::Overflow => &self.dropped_overflow,
            DropReason::RetriesExhausted => &self.dropped_retries_exhausted,
            DropReason::Rejected => &self.dropped_rejected,
            DropReason::Unauthorized => &self.dropped_unauthorized,
            DropReason::Closed => &self.dropped_closed,
            DropReason::ShutdownTimeout => &self.dropped_shutdown_timeout,
        };
        counter.fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, buffered: usize) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered_entries: self.delivered_entries.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_retries_exhausted: self.dropped_retries_exhausted.load(Ordering::Relaxed),
            dropped_rejected: self.dropped_rejected.load(Ordering::Relaxed),
            dropped_unauthorized: self.dropped_unauthorized.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            dropped_shutdown_timeout: self.dropped_shutdown_timeout.load(Ordering::Relaxed),
            buffered: buffered as u64,
        }
    }
}
