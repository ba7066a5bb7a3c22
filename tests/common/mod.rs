#![allow(dead_code)]

use gt8004_sdk::{BatchDelivery, DeliveryOutcome, LogBatch, LogEntry};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory delivery that records every attempt and replays scripted
/// outcomes, answering `Delivered` once the script runs out.
#[derive(Default)]
pub struct RecordingDelivery {
    attempts: Mutex<Vec<LogBatch>>,
    script: Mutex<VecDeque<DeliveryOutcome>>,
    fallback: Mutex<Option<DeliveryOutcome>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn always(outcome: DeliveryOutcome) -> Arc<Self> {
        let delivery = Self::default();
        *delivery.fallback.lock().unwrap() = Some(outcome);
        Arc::new(delivery)
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = DeliveryOutcome>) -> Arc<Self> {
        let delivery = Self::default();
        delivery.script.lock().unwrap().extend(outcomes);
        Arc::new(delivery)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn batches(&self) -> Vec<LogBatch> {
        self.attempts.lock().unwrap().clone()
    }

    /// Request ids per attempt, in attempt order.
    pub fn request_ids(&self) -> Vec<Vec<String>> {
        self.batches()
            .iter()
            .map(|batch| {
                batch
                    .entries()
                    .iter()
                    .map(|entry| entry.request_id.clone())
                    .collect()
            })
            .collect()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.batches()
            .into_iter()
            .flat_map(LogBatch::into_entries)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> DeliveryOutcome {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(DeliveryOutcome::Delivered { status: 202 })
    }
}

impl BatchDelivery for RecordingDelivery {
    fn deliver<'a>(
        &'a self,
        batch: &'a LogBatch,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.attempts.lock().unwrap().push(batch.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.next_outcome()
        })
    }
}

pub fn entry(i: usize) -> LogEntry {
    LogEntry::new("POST", "/mcp/tools/search", 200, 1.5).with_request_id(format!("req-{i}"))
}

pub fn ids(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("req-{i}")).collect()
}
