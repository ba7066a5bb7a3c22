use super::queue::{EntryBuffer, QueuedEntry};
use crate::domain::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub const SDK_VERSION: &str = concat!("rust-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushTrigger {
    SizeBased,
    TimeBased,
    Explicit,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    agent_id: String,
    sdk_version: String,
    batch_id: String,
    entries: Vec<LogEntry>,
}

impl LogBatch {
    pub fn new(agent_id: impl Into<String>, entries: Vec<LogEntry>) -> Self {
        Self::with_id(agent_id, Uuid::new_v4().to_string(), entries)
    }

    pub fn with_id(
        agent_id: impl Into<String>,
        batch_id: impl Into<String>,
        entries: Vec<LogEntry>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            sdk_version: SDK_VERSION.to_string(),
            batch_id: batch_id.into(),
            entries,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn sdk_version(&self) -> &str {
        &self.sdk_version
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct PendingBatch {
    batch: LogBatch,
    attempts: Vec<u32>,
    trigger: FlushTrigger,
}

#[derive(Debug, Default)]
pub struct RetrySplit {
    pub requeue: Vec<QueuedEntry>,
    pub exhausted: Vec<LogEntry>,
}

impl PendingBatch {
    pub fn batch(&self) -> &LogBatch {
        &self.batch
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    pub fn into_batch(self) -> LogBatch {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempts.iter().copied().max().unwrap_or(0) + 1
    }

    pub fn to_queued(&self) -> Vec<QueuedEntry> {
        self.batch
            .entries()
            .iter()
            .cloned()
            .zip(self.attempts.iter().copied())
            .map(|(entry, attempts)| QueuedEntry { entry, attempts })
            .collect()
    }

    pub fn into_retry(self, max_retries: u32) -> RetrySplit {
        let mut split = RetrySplit::default();
        for (entry, attempts) in self.batch.into_entries().into_iter().zip(self.attempts) {
            let attempts = attempts + 1;
            if attempts >= max_retries {
                split.exhausted.push(entry);
            } else {
                split.requeue.push(QueuedEntry { entry, attempts });
            }
        }
        split
    }
}

#[derive(Debug, Clone)]
pub struct BatchAssembler {
    agent_id: String,
    batch_size: usize,
}

impl BatchAssembler {
    pub fn new(agent_id: impl Into<String>, batch_size: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn assemble(
        &self,
        buffer: &mut EntryBuffer,
        trigger: FlushTrigger,
    ) -> Option<PendingBatch> {
        let mut drained = buffer.drain(self.batch_size);
        if drained.is_empty() {
            return None;
        }

        // A request id appears at most once per batch; cut before a repeat.
        let mut seen = HashSet::with_capacity(drained.len());
        if let Some(cut) = drained
            .iter()
            .position(|queued| !seen.insert(queued.entry.request_id.clone()))
        {
            let tail = drained.split_off(cut);
            buffer.requeue_front(tail);
        }

        let (entries, attempts): (Vec<LogEntry>, Vec<u32>) = drained
            .into_iter()
            .map(|queued| (queued.entry, queued.attempts))
            .unzip();

        Some(PendingBatch {
            batch: LogBatch::new(self.agent_id.clone(), entries),
            attempts,
            trigger,
        })
    }
}
