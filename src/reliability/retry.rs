use crate::buffer::{PendingBatch, QueuedEntry};
use crate::domain::LogEntry;
use crate::sender::{DeliveryError, DeliveryOutcome};
use serde::{Deserialize, Serialize};

/// Why entries left the logger without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Evicted to keep the buffer under its capacity.
    Overflow,
    /// Spent their delivery budget on retryable failures.
    RetriesExhausted,
    /// The endpoint rejected the batch with a non-auth 4xx.
    Rejected,
    /// The endpoint rejected the credentials.
    Unauthorized,
    /// Logged after `close()`.
    Closed,
    /// Still buffered when the close deadline passed.
    ShutdownTimeout,
}

/// What to do with a batch once its delivery attempt resolved.
#[derive(Debug, Default)]
pub struct Settlement {
    pub delivered: usize,
    /// Entries to put back at the head of the buffer.
    pub requeue: Vec<QueuedEntry>,
    pub dropped: Vec<LogEntry>,
    pub drop_reason: Option<DropReason>,
}

impl Settlement {
    /// True when the attempt failed, whatever happened to the entries.
    pub fn failed(&self) -> bool {
        self.delivered == 0
    }
}

/// Per-entry delivery budget.
///
/// Every entry of a batch is charged one attempt per failed delivery. Once an
/// entry has been attempted `max_retries` times it is dropped.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn settle(&self, pending: PendingBatch, outcome: &DeliveryOutcome) -> Settlement {
        match outcome {
            DeliveryOutcome::Delivered { .. } => Settlement {
                delivered: pending.len(),
                ..Settlement::default()
            },
            DeliveryOutcome::Retryable(_) => {
                let split = pending.into_retry(self.max_retries);
                let drop_reason =
                    (!split.exhausted.is_empty()).then_some(DropReason::RetriesExhausted);
                Settlement {
                    delivered: 0,
                    requeue: split.requeue,
                    dropped: split.exhausted,
                    drop_reason,
                }
            }
            DeliveryOutcome::Fatal(err) => {
                let reason = match err {
                    DeliveryError::Auth { .. } => DropReason::Unauthorized,
                    _ => DropReason::Rejected,
                };
                Settlement {
                    delivered: 0,
                    requeue: Vec::new(),
                    dropped: pending.into_batch().into_entries(),
                    drop_reason: Some(reason),
                }
            }
        }
    }
}
