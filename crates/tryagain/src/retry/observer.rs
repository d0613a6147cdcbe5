//! Retry observation and logging
//!
//! This module provides the `FailureObserver` trait, which receives every
//! failed attempt of a retry loop, along with a few stock observers:
//!
//! - any `FnMut(E)` closure
//! - [`NoOpObserver`] for an absent observer
//! - [`TracingObserver`] for structured logs through `tracing`
//! - [`StatsObserver`] for counting events
//!
//! Observers run outside the panic guard. A panic raised by an observer
//! unwinds through the retry loop to its caller and ends the loop.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observer for the events of a retry loop
///
/// Only [`on_failure`](FailureObserver::on_failure) is required; the other
/// hooks default to doing nothing. Attempt numbers are 1-indexed.
///
/// # Example
///
/// ```rust
/// use tryagain::retry::FailureObserver;
///
/// struct LastError(Option<String>);
///
/// impl FailureObserver<std::io::Error> for LastError {
///     fn on_failure(&mut self, _attempt: u64, error: std::io::Error) {
///         self.0 = Some(error.to_string());
///     }
/// }
/// ```
pub trait FailureObserver<E> {
    /// Called once for every failed attempt, with the failure value
    fn on_failure(&mut self, attempt: u64, error: E);

    /// Called right before an attempt runs
    fn on_attempt_start(&mut self, attempt: u64) {
        let _ = attempt;
    }

    /// Called when an attempt succeeds
    ///
    /// * `elapsed` - Time since the loop started
    fn on_success(&mut self, attempt: u64, elapsed: Duration) {
        let _ = (attempt, elapsed);
    }

    /// Called when a bounded budget runs out without a success
    fn on_exhausted(&mut self, attempts: u64) {
        let _ = attempts;
    }

    /// Called when the loop stops because of cancellation or its time limit
    fn on_cancelled(&mut self, attempts: u64) {
        let _ = attempts;
    }
}

impl<E, F> FailureObserver<E> for F
where
    F: FnMut(E),
{
    fn on_failure(&mut self, _attempt: u64, error: E) {
        self(error)
    }
}

/// An observer that does nothing
///
/// Stands in for an absent observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl<E> FailureObserver<E> for NoOpObserver {
    fn on_failure(&mut self, _attempt: u64, _error: E) {}
}

/// Adapts an optional callback into an observer
///
/// `None` behaves like [`NoOpObserver`].
#[derive(Debug, Clone, Default)]
pub struct OptionalObserver<O>(pub Option<O>);

impl<E, O> FailureObserver<E> for OptionalObserver<O>
where
    O: FailureObserver<E>,
{
    fn on_failure(&mut self, attempt: u64, error: E) {
        if let Some(observer) = self.0.as_mut() {
            observer.on_failure(attempt, error);
        }
    }

    fn on_attempt_start(&mut self, attempt: u64) {
        if let Some(observer) = self.0.as_mut() {
            observer.on_attempt_start(attempt);
        }
    }

    fn on_success(&mut self, attempt: u64, elapsed: Duration) {
        if let Some(observer) = self.0.as_mut() {
            observer.on_success(attempt, elapsed);
        }
    }

    fn on_exhausted(&mut self, attempts: u64) {
        if let Some(observer) = self.0.as_mut() {
            observer.on_exhausted(attempts);
        }
    }

    fn on_cancelled(&mut self, attempts: u64) {
        if let Some(observer) = self.0.as_mut() {
            observer.on_cancelled(attempts);
        }
    }
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_failure`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR
/// - `on_cancelled`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// * `operation` - A descriptive name for the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl<E: Display> FailureObserver<E> for TracingObserver {
    fn on_failure(&mut self, attempt: u64, error: E) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "attempt failed"
        );
    }

    fn on_attempt_start(&mut self, attempt: u64) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            "starting attempt"
        );
    }

    fn on_success(&mut self, attempt: u64, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&mut self, attempts: u64) {
        tracing::error!(
            operation = %self.operation,
            attempts = attempts,
            "all retry attempts exhausted"
        );
    }

    fn on_cancelled(&mut self, attempts: u64) {
        tracing::warn!(
            operation = %self.operation,
            attempts = attempts,
            "retry cancelled"
        );
    }
}

/// An observer that counts retry events
///
/// Clones share the same counters, so a caller can hand one clone to the loop
/// and read the totals from another.
#[derive(Debug, Clone, Default)]
pub struct StatsObserver {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    attempt_starts: AtomicU64,
    failures: AtomicU64,
    successes: AtomicU64,
    exhaustions: AtomicU64,
    cancellations: AtomicU64,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u64 {
        self.counters.attempt_starts.load(Ordering::SeqCst)
    }

    /// Get the number of failures
    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u64 {
        self.counters.successes.load(Ordering::SeqCst)
    }

    /// Get the number of exhaustions
    pub fn exhaustions(&self) -> u64 {
        self.counters.exhaustions.load(Ordering::SeqCst)
    }

    /// Get the number of cancellations
    pub fn cancellations(&self) -> u64 {
        self.counters.cancellations.load(Ordering::SeqCst)
    }
}

impl<E> FailureObserver<E> for StatsObserver {
    fn on_failure(&mut self, _attempt: u64, _error: E) {
        self.counters.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_start(&mut self, _attempt: u64) {
        self.counters.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&mut self, _attempt: u64, _elapsed: Duration) {
        self.counters.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&mut self, _attempts: u64) {
        self.counters.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&mut self, _attempts: u64) {
        self.counters.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}
