//! Lifecycle events of an invocation.
//!
//! The executor never logs on its own; it reports state transitions to a
//! `RetryObserver`. `TracingObserver` turns them into `tracing` events and
//! `StatsObserver` counts them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::classify::StopReason;
use super::failure::FailureRecord;

/// Callbacks for the executor's state transitions. All methods default to no-ops.
pub trait RetryObserver: Send + Sync {
    /// Entering `Attempting` for attempt number `attempt` (1-based).
    fn on_attempt_start(&self, operation: &str, attempt: u32, max_attempts: u32) {
        let _ = (operation, attempt, max_attempts);
    }

    /// Attempt failed with a retryable failure; waiting `delay` before the next one.
    fn on_retry_scheduled(
        &self,
        operation: &str,
        attempt: u32,
        failure: &FailureRecord,
        delay: Duration,
    ) {
        let _ = (operation, attempt, failure, delay);
    }

    /// Attempt returned a value.
    fn on_success(&self, operation: &str, attempt: u32, elapsed: Duration) {
        let _ = (operation, attempt, elapsed);
    }

    /// Retries stopped; the failure goes to the recovery registry.
    fn on_recovery(&self, operation: &str, attempt: u32, reason: &StopReason, failure: &FailureRecord) {
        let _ = (operation, attempt, reason, failure);
    }

    /// Backoff wait was cancelled.
    fn on_cancelled(&self, operation: &str, attempt: u32) {
        let _ = (operation, attempt);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {}

/// Logs events with `tracing`: attempt start at DEBUG, scheduled retries at
/// WARN, late success at INFO, recovery at WARN, cancellation at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, operation: &str, attempt: u32, max_attempts: u32) {
        tracing::debug!(operation, attempt, max_attempts, "starting attempt");
    }

    fn on_retry_scheduled(
        &self,
        operation: &str,
        attempt: u32,
        failure: &FailureRecord,
        delay: Duration,
    ) {
        tracing::warn!(
            operation,
            attempt,
            kind = %failure.kind(),
            error = %failure.message(),
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, operation: &str, attempt: u32, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(operation, "succeeded on first attempt");
        }
    }

    fn on_recovery(&self, operation: &str, attempt: u32, reason: &StopReason, failure: &FailureRecord) {
        match reason {
            StopReason::Exhausted => tracing::warn!(
                operation,
                attempts = attempt,
                kind = %failure.kind(),
                "retries exhausted, dispatching recovery"
            ),
            StopReason::NonRetryable(matched) => tracing::warn!(
                operation,
                attempt,
                kind = %failure.kind(),
                matched = %matched,
                "non-retryable failure, dispatching recovery"
            ),
        }
    }

    fn on_cancelled(&self, operation: &str, attempt: u32) {
        tracing::info!(operation, attempt, "cancelled during backoff");
    }
}

/// Counts events and records every scheduled backoff delay.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    retries: AtomicU32,
    successes: AtomicU32,
    recoveries: AtomicU32,
    cancellations: AtomicU32,
    delays: Mutex<Vec<Duration>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Scheduled backoff delays, in order.
    pub fn delays(&self) -> Vec<Duration> {
        match self.delays.lock() {
            Ok(d) => d.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _operation: &str, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry_scheduled(
        &self,
        _operation: &str,
        _attempt: u32,
        _failure: &FailureRecord,
        delay: Duration,
    ) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        match self.delays.lock() {
            Ok(mut d) => d.push(delay),
            Err(poisoned) => poisoned.into_inner().push(delay),
        }
    }

    fn on_success(&self, _operation: &str, _attempt: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recovery(&self, _operation: &str, _attempt: u32, _reason: &StopReason, _failure: &FailureRecord) {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _operation: &str, _attempt: u32) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_attempt_start(&self, operation: &str, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(operation, attempt, max_attempts)
    }

    fn on_retry_scheduled(
        &self,
        operation: &str,
        attempt: u32,
        failure: &FailureRecord,
        delay: Duration,
    ) {
        (**self).on_retry_scheduled(operation, attempt, failure, delay)
    }

    fn on_success(&self, operation: &str, attempt: u32, elapsed: Duration) {
        (**self).on_success(operation, attempt, elapsed)
    }

    fn on_recovery(&self, operation: &str, attempt: u32, reason: &StopReason, failure: &FailureRecord) {
        (**self).on_recovery(operation, attempt, reason, failure)
    }

    fn on_cancelled(&self, operation: &str, attempt: u32) {
        (**self).on_cancelled(operation, attempt)
    }
}
