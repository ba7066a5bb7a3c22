use super::Shared;
use super::diagnostics::diag;
use crate::buffer::{FlushTrigger, PendingBatch};
use crate::reliability::DropReason;
use crate::sender::DeliveryOutcome;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a flush loop should treat a batch that needs another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryMode {
    /// Leave it queued for a later tick.
    Defer,
    /// Try again right away; used while closing.
    Immediate,
}

/// What one delivery cycle left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleResult {
    /// Nothing was buffered.
    Idle,
    /// The batch was delivered or dropped.
    Settled,
    /// Some entries went back to the buffer for another attempt.
    Requeued,
}

/// Background task: fires a flush on every tick and whenever the buffer
/// reaches `batch_size`, until cancelled.
pub(crate) async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let period = shared.config.flush_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(target: "gt8004_sdk", "Flush scheduler started with interval {:?}", period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.awaiting_tick.store(false, Ordering::Release);
                shared.scheduled_flush(FlushTrigger::TimeBased).await;
            }
            () = shared.wake.notified() => {
                shared.scheduled_flush(FlushTrigger::SizeBased).await;
            }
        }
    }

    debug!(target: "gt8004_sdk", "Flush scheduler stopped");
}

impl Shared {
    /// A timer or size trigger. Skipped when another flush is running, the
    /// circuit is open, or a size trigger arrives while a retry waits for its
    /// tick.
    async fn scheduled_flush(&self, trigger: FlushTrigger) {
        if trigger == FlushTrigger::SizeBased && self.awaiting_tick.load(Ordering::Acquire) {
            return;
        }

        if self.circuit.lock().is_open() {
            diag!(
                self.config.debug,
                debug,
                ?trigger,
                "Circuit open, skipping scheduled flush"
            );
            return;
        }

        let Ok(_guard) = self.flush_lock.try_lock() else {
            // Coalesced into the flush already in flight.
            return;
        };

        self.flush_cycles(trigger, RetryMode::Defer, false).await;
    }

    pub(super) async fn flush_now(&self) {
        let _guard = self.flush_lock.lock().await;
        self.flush_cycles(FlushTrigger::Explicit, RetryMode::Defer, true)
            .await;
    }

    /// Drains the whole buffer, retrying immediately until every entry is
    /// delivered or dropped.
    pub(super) async fn drain_all(&self) {
        let _guard = self.flush_lock.lock().await;
        self.flush_cycles(FlushTrigger::Shutdown, RetryMode::Immediate, true)
            .await;
    }

    /// Runs delivery cycles back to back.
    ///
    /// A scheduled flush keeps going while a full batch is waiting; `drain`
    /// keeps going until the buffer is empty.
    async fn flush_cycles(&self, trigger: FlushTrigger, mode: RetryMode, drain: bool) {
        loop {
            match self.run_cycle(trigger).await {
                CycleResult::Idle => return,
                CycleResult::Requeued if mode == RetryMode::Defer => return,
                CycleResult::Requeued | CycleResult::Settled => {}
            }

            let remaining = self.buffer.lock().len();
            let more = if drain {
                remaining > 0
            } else {
                remaining >= self.config.batch_size
            };
            if !more {
                return;
            }
        }
    }

    async fn run_cycle(&self, trigger: FlushTrigger) -> CycleResult {
        // The buffer lock is released before delivery starts.
        let pending = {
            let mut buffer = self.buffer.lock();
            self.assembler.assemble(&mut buffer, trigger)
        };
        match pending {
            Some(pending) => self.deliver(pending).await,
            None => CycleResult::Idle,
        }
    }

    async fn deliver(&self, pending: PendingBatch) -> CycleResult {
        let debug = self.config.debug;
        let batch_id = pending.batch().batch_id().to_string();
        let entries = pending.len();
        let attempt = pending.attempt_number();

        let in_flight = InFlight::new(self, &pending);
        let outcome = self.delivery.deliver(pending.batch()).await;
        in_flight.settle();

        match &outcome {
            DeliveryOutcome::Delivered { status } => {
                diag!(
                    debug,
                    info,
                    %batch_id,
                    entries,
                    status,
                    trigger = ?pending.trigger(),
                    "Batch delivered"
                );
            }
            DeliveryOutcome::Retryable(err) => {
                diag!(
                    debug,
                    warn,
                    %batch_id,
                    entries,
                    attempt,
                    max_retries = self.retry.max_retries(),
                    error = %err,
                    "Batch delivery failed, will retry"
                );
            }
            DeliveryOutcome::Fatal(err) => {
                diag!(
                    debug,
                    error,
                    %batch_id,
                    entries,
                    error = %err,
                    "Batch rejected, dropping"
                );
            }
        }

        let settlement = self.retry.settle(pending, &outcome);

        if settlement.failed() {
            self.stats.record_failed_batch();
            if self.circuit.lock().record_failure() {
                diag!(
                    debug,
                    warn,
                    cooldown = ?self.config.circuit_cooldown,
                    "Too many consecutive delivery failures, pausing scheduled flushes"
                );
            }
        } else {
            self.stats.record_delivered(settlement.delivered);
            self.circuit.lock().record_success();
        }

        if let Some(reason) = settlement.drop_reason {
            self.stats.record_dropped(reason, settlement.dropped.len());
            if reason == DropReason::RetriesExhausted {
                diag!(
                    debug,
                    warn,
                    %batch_id,
                    dropped = settlement.dropped.len(),
                    "Retry budget spent, dropping entries"
                );
            }
        }

        if settlement.requeue.is_empty() {
            self.awaiting_tick.store(false, Ordering::Release);
            return CycleResult::Settled;
        }

        let requeued = settlement.requeue.len();
        self.stats.record_retries(requeued);
        let evicted = self.buffer.lock().requeue_front(settlement.requeue);
        if evicted > 0 {
            self.stats.record_dropped(DropReason::Overflow, evicted);
        }
        self.awaiting_tick.store(true, Ordering::Release);
        CycleResult::Requeued
    }
}

/// Puts a batch back at the head of the buffer, attempts uncharged, if its
/// delivery future is dropped before it resolves. This happens when `close`
/// hits its deadline mid-request or aborts a worker that is mid-flush.
struct InFlight<'a> {
    shared: &'a Shared,
    pending: &'a PendingBatch,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(shared: &'a Shared, pending: &'a PendingBatch) -> Self {
        Self {
            shared,
            pending,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let entries = self.pending.to_queued();
        let returned = entries.len();
        let evicted = self.shared.buffer.lock().requeue_front(entries);
        if evicted > 0 {
            self.shared.stats.record_dropped(DropReason::Overflow, evicted);
        }
        diag!(
            self.shared.config.debug,
            warn,
            batch_id = %self.pending.batch().batch_id(),
            entries = returned,
            "Delivery interrupted, batch returned to buffer"
        );
    }
}
