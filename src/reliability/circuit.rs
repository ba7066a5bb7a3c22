use std::time::Duration;
use tokio::time::Instant;

/// Pauses scheduled flushes after a run of failed delivery cycles.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            consecutive_failures: 0,
            open_until: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether scheduled flushes should be skipped right now.
    pub fn is_open(&self) -> bool {
        self.open_until
            .is_some_and(|until| Instant::now() < until)
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    /// Returns true when this failure opened the circuit.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.failure_threshold && !self.is_open() {
            self.open_until = Some(Instant::now() + self.cooldown);
            self.consecutive_failures = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.record_success();
    }
}
