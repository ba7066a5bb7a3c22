use super::error::BufferError;
use super::metrics::BufferMetrics;
use crate::domain::LogEntry;
use std::collections::VecDeque;

// Prevent excessive memory allocation
const MAX_CAPACITY: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEntry {
    pub entry: LogEntry,
    pub attempts: u32,
}

impl QueuedEntry {
    pub fn new(entry: LogEntry) -> Self {
        Self { entry, attempts: 0 }
    }
}

#[derive(Debug)]
pub struct EntryBuffer {
    entries: VecDeque<QueuedEntry>,
    capacity: usize,
    pushed: u64,
    drained: u64,
    requeued: u64,
    evicted: u64,
    peak_len: usize,
}

impl EntryBuffer {
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(BufferError::InvalidCapacity { capacity });
        }

        Ok(Self {
            entries: VecDeque::new(),
            capacity,
            pushed: 0,
            drained: 0,
            requeued: 0,
            evicted: 0,
            peak_len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: LogEntry) -> usize {
        self.entries.push_back(QueuedEntry::new(entry));
        self.pushed += 1;
        self.enforce_capacity()
    }

    pub fn drain(&mut self, max: usize) -> Vec<QueuedEntry> {
        let count = max.min(self.entries.len());
        let drained: Vec<QueuedEntry> = self.entries.drain(..count).collect();
        self.drained += drained.len() as u64;
        drained
    }

    pub fn requeue_front(&mut self, entries: Vec<QueuedEntry>) -> usize {
        self.requeued += entries.len() as u64;
        for queued in entries.into_iter().rev() {
            self.entries.push_front(queued);
        }
        self.enforce_capacity()
    }

    pub fn clear(&mut self) -> Vec<QueuedEntry> {
        self.entries.drain(..).collect()
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            capacity: self.capacity,
            len: self.entries.len(),
            peak_len: self.peak_len,
            pushed: self.pushed,
            drained: self.drained,
            requeued: self.requeued,
            evicted: self.evicted,
        }
    }

    // Past capacity the oldest entries go first.
    fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        self.evicted += evicted as u64;
        self.peak_len = self.peak_len.max(self.entries.len());
        evicted
    }
}
