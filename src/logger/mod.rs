//! The buffered telemetry logger.
//!
//! A [`Logger`] owns an entry buffer and one background task. Entries are
//! pushed synchronously; the task cuts them into batches and hands them to a
//! [`BatchDelivery`] when the buffer fills up or the flush interval elapses.
//! Cloning a `Logger` is cheap and every clone feeds the same buffer.

mod diagnostics;
mod scheduler;

use crate::buffer::{BatchAssembler, BufferError, EntryBuffer};
use crate::config::LoggerConfig;
use crate::domain::{LogEntry, SdkError};
use crate::reliability::{CircuitBreaker, DropReason, LoggerStats, RetryPolicy, StatsSnapshot};
use crate::sender::{BatchDelivery, BatchTransmitter, ClientConfig, HttpClient};
use diagnostics::diag;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

/// State shared between logger handles and the background task.
pub(crate) struct Shared {
    config: LoggerConfig,
    buffer: Mutex<EntryBuffer>,
    assembler: BatchAssembler,
    retry: RetryPolicy,
    delivery: Arc<dyn BatchDelivery>,
    circuit: Mutex<CircuitBreaker>,
    /// Held for the whole of a flush; at most one runs at a time.
    flush_lock: tokio::sync::Mutex<()>,
    /// Set after a retryable failure until the next timer tick.
    awaiting_tick: AtomicBool,
    stats: LoggerStats,
    closed: AtomicBool,
    wake: Notify,
}

/// Cancels the background task once the last handle is gone.
struct Worker {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    worker: Arc<Worker>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.shared.config)
            .field("buffered", &self.buffered())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Logger {
    /// Builds a logger that posts to the configured ingest endpoint.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: LoggerConfig) -> Result<Self, SdkError> {
        config.validate()?;
        let client = HttpClient::new(ClientConfig::from(&config))?;
        Self::with_delivery(config, Arc::new(BatchTransmitter::new(client)))
    }

    /// Builds a logger around a custom delivery implementation.
    pub fn with_delivery(
        config: LoggerConfig,
        delivery: Arc<dyn BatchDelivery>,
    ) -> Result<Self, SdkError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SdkError::Runtime(e.to_string()))?;

        let shared = Arc::new(Shared {
            buffer: Mutex::new(EntryBuffer::new(config.buffer_capacity)?),
            assembler: BatchAssembler::new(config.agent_id.clone(), config.batch_size),
            retry: RetryPolicy::new(config.max_retries),
            circuit: Mutex::new(CircuitBreaker::new(
                config.circuit_failure_threshold,
                config.circuit_cooldown,
            )),
            delivery,
            flush_lock: tokio::sync::Mutex::new(()),
            awaiting_tick: AtomicBool::new(false),
            stats: LoggerStats::default(),
            closed: AtomicBool::new(false),
            wake: Notify::new(),
            config,
        });

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(scheduler::run(Arc::clone(&shared), cancel.clone()));

        diag!(
            shared.config.debug,
            info,
            agent_id = %shared.config.agent_id,
            endpoint = %shared.config.endpoint,
            batch_size = shared.config.batch_size,
            "Logger started"
        );

        Ok(Self {
            shared,
            worker: Arc::new(Worker {
                cancel,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.shared.config
    }

    /// Queues an entry for delivery. Never blocks on the network.
    ///
    /// Fails only once the logger has been closed, in which case the entry is
    /// discarded.
    pub fn log(&self, entry: LogEntry) -> Result<(), BufferError> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            shared.stats.record_dropped(DropReason::Closed, 1);
            diag!(
                shared.config.debug,
                warn,
                request_id = %entry.request_id,
                "Logger is closed, dropping entry"
            );
            return Err(BufferError::Closed);
        }

        let (evicted, len) = {
            let mut buffer = shared.buffer.lock();
            let evicted = buffer.push(entry);
            (evicted, buffer.len())
        };
        shared.stats.record_enqueued();

        if evicted > 0 {
            shared.stats.record_dropped(DropReason::Overflow, evicted);
            diag!(
                shared.config.debug,
                warn,
                evicted,
                capacity = shared.config.buffer_capacity,
                "Buffer full, dropped oldest entries"
            );
        }

        if len >= shared.config.batch_size {
            shared.wake.notify_one();
        }
        Ok(())
    }

    /// Delivers everything currently buffered, waiting for an in-flight flush
    /// first. Stops early if a batch hits a retryable failure; those entries
    /// stay queued for the next tick.
    pub async fn flush(&self) {
        self.shared.flush_now().await;
    }

    /// Stops the background task and drains the buffer.
    ///
    /// Delivery continues until every entry is delivered or has spent its
    /// retry budget, bounded by `close_timeout`. Entries still queued at the
    /// deadline, including a batch whose request was cut off, are dropped and
    /// counted as `ShutdownTimeout`. Later calls return immediately.
    pub async fn close(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let deadline = Instant::now() + shared.config.close_timeout;
        self.worker.cancel.cancel();

        let handle = self.worker.handle.lock().take();
        if let Some(mut handle) = handle {
            if timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                // Wait for the task to be dropped so an interrupted batch is
                // back in the buffer before it is counted below.
                let _ = handle.await;
            }
        }

        shared.circuit.lock().reset();
        let drained = Instant::now() < deadline
            && timeout_at(deadline, shared.drain_all()).await.is_ok();
        if !drained {
            let remaining = shared.buffer.lock().clear();
            shared
                .stats
                .record_dropped(DropReason::ShutdownTimeout, remaining.len());
            diag!(
                shared.config.debug,
                warn,
                dropped = remaining.len(),
                "Close deadline passed, dropping undelivered entries"
            );
        }

        let stats = self.stats();
        diag!(
            shared.config.debug,
            info,
            delivered = stats.delivered_entries,
            dropped = stats.dropped_total(),
            "Logger closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Entries waiting for delivery right now.
    pub fn buffered(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(self.buffered())
    }
}
