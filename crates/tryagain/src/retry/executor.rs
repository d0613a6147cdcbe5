//! Retry execution engine
//!
//! This module provides the retry loop itself: a budget of attempts, a fixed
//! period between them, an observer notified of every failure, and the panic
//! guard around each attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::guard::{self, RecoveredPanic};

use super::cancel::CancellationToken;
use super::observer::{FailureObserver, NoOpObserver, OptionalObserver};
use super::sleeper::{Sleeper, ThreadSleeper};

/// Period used when none, or a zero one, is supplied
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// Resolve the pause between attempts
///
/// Returns `period` when it is positive, [`DEFAULT_PERIOD`] otherwise.
pub fn effective_period(period: Option<Duration>) -> Duration {
    period
        .filter(|p| !p.is_zero())
        .unwrap_or(DEFAULT_PERIOD)
}

/// How many attempts a loop may make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// At most this many attempts; zero means the operation never runs
    Attempts(u64),
    /// Keep going until the operation succeeds
    Unbounded,
}

impl RetryBudget {
    /// Build a budget from a signed count; negative means unbounded
    pub fn from_signed(retries: i64) -> Self {
        if retries < 0 {
            RetryBudget::Unbounded
        } else {
            RetryBudget::Attempts(retries.unsigned_abs())
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, RetryBudget::Unbounded)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        RetryBudget::Attempts(3)
    }
}

impl From<i64> for RetryBudget {
    fn from(retries: i64) -> Self {
        RetryBudget::from_signed(retries)
    }
}

/// How a retry loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded
    Succeeded {
        /// The value returned by the successful attempt
        value: T,
        /// Attempts made, the successful one included
        attempts: u64,
    },
    /// The bounded budget ran out; every attempt failed
    Exhausted { attempts: u64 },
    /// The cancellation token fired
    Cancelled { attempts: u64 },
    /// The time limit elapsed
    TimedOut { attempts: u64 },
}

impl<T> RetryOutcome<T> {
    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u64 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts }
            | RetryOutcome::Cancelled { attempts }
            | RetryOutcome::TimedOut { attempts } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryOutcome::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryOutcome::Cancelled { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RetryOutcome::TimedOut { .. })
    }

    /// The success value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Retry `op` up to `retries` times, pausing `period` between attempts
///
/// A negative `retries` retries until the operation succeeds; zero never
/// runs it. Each failure, returned or recovered from a panic, is handed to
/// `on_error`. The pause defaults to five seconds when `period` is `None`
/// or zero.
///
/// A panic raised inside `on_error` is not intercepted and ends the loop.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tryagain::guard::RecoveredPanic;
/// use tryagain::retry::retry;
///
/// retry(
///     || -> Result<(), RecoveredPanic> { Ok(()) },
///     3,
///     Some(|err: RecoveredPanic| eprintln!("attempt failed: {err}")),
///     Some(Duration::from_millis(250)),
/// );
/// ```
pub fn retry<T, E, F, O>(op: F, retries: i64, on_error: Option<O>, period: Option<Duration>)
where
    F: FnMut() -> Result<T, E>,
    E: From<RecoveredPanic> + 'static,
    O: FnMut(E),
{
    let mut retrier = Retrier::builder()
        .retries(retries)
        .period(effective_period(period))
        .observer(OptionalObserver(on_error))
        .build();

    retrier.run(op);
}

/// Builder for configuring a [`Retrier`]
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tryagain::retry::{Retrier, TracingObserver};
///
/// let retrier = Retrier::builder()
///     .retries(5)
///     .period(Duration::from_millis(200))
///     .observer(TracingObserver::new("connect"))
///     .build();
/// ```
pub struct RetrierBuilder<O = NoOpObserver, S = ThreadSleeper> {
    budget: RetryBudget,
    period: Duration,
    observer: O,
    sleeper: S,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl Default for RetrierBuilder<NoOpObserver, ThreadSleeper> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrierBuilder<NoOpObserver, ThreadSleeper> {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            budget: RetryBudget::default(),
            period: DEFAULT_PERIOD,
            observer: NoOpObserver,
            sleeper: ThreadSleeper,
            cancel: CancellationToken::new(),
            timeout: None,
        }
    }
}

impl<O, S> RetrierBuilder<O, S> {
    /// Set the attempt budget
    pub fn budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the attempt budget from a signed count; negative means unbounded
    pub fn retries(self, retries: i64) -> Self {
        self.budget(RetryBudget::from_signed(retries))
    }

    /// Set the pause between attempts
    ///
    /// A zero period falls back to [`DEFAULT_PERIOD`].
    pub fn period(mut self, period: Duration) -> Self {
        self.period = effective_period(Some(period));
        self
    }

    /// Set the observer notified of failures
    pub fn observer<O2>(self, observer: O2) -> RetrierBuilder<O2, S> {
        RetrierBuilder {
            budget: self.budget,
            period: self.period,
            observer,
            sleeper: self.sleeper,
            cancel: self.cancel,
            timeout: self.timeout,
        }
    }

    /// Set how the blocking loop pauses between attempts
    pub fn sleeper<S2>(self, sleeper: S2) -> RetrierBuilder<O, S2> {
        RetrierBuilder {
            budget: self.budget,
            period: self.period,
            observer: self.observer,
            sleeper,
            cancel: self.cancel,
            timeout: self.timeout,
        }
    }

    /// Stop the loop once `token` is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop the loop once `limit` has elapsed since it started
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Build the retrier
    pub fn build(self) -> Retrier<O, S> {
        Retrier {
            budget: self.budget,
            period: self.period,
            observer: self.observer,
            sleeper: self.sleeper,
            cancel: self.cancel,
            timeout: self.timeout,
        }
    }
}

/// A retry loop with a fixed period between attempts
///
/// Use [`Retrier::builder`] to create an instance.
pub struct Retrier<O = NoOpObserver, S = ThreadSleeper> {
    budget: RetryBudget,
    period: Duration,
    observer: O,
    sleeper: S,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl Retrier {
    pub fn builder() -> RetrierBuilder {
        RetrierBuilder::new()
    }
}

/// Why the loop stopped before running out of attempts
enum Halt {
    Cancelled,
    TimedOut,
}

impl<O, S> Retrier<O, S> {
    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Token that stops this retrier when cancelled
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn check_halt(&self, elapsed: Duration) -> Option<Halt> {
        if self.cancel.is_cancelled() {
            return Some(Halt::Cancelled);
        }
        match self.timeout {
            Some(limit) if elapsed >= limit => Some(Halt::TimedOut),
            _ => None,
        }
    }

    /// Pause before the next attempt, truncated to what is left of the limit
    fn pause_for(&self, elapsed: Duration) -> Duration {
        match self.timeout {
            Some(limit) => self.period.min(limit.saturating_sub(elapsed)),
            None => self.period,
        }
    }

    fn halted<T, E>(&mut self, halt: Halt, attempts: u64) -> RetryOutcome<T>
    where
        O: FailureObserver<E>,
    {
        self.observer.on_cancelled(attempts);
        match halt {
            Halt::Cancelled => {
                tracing::debug!(attempts, "retry loop cancelled");
                RetryOutcome::Cancelled { attempts }
            }
            Halt::TimedOut => {
                tracing::debug!(attempts, "retry loop reached its time limit");
                RetryOutcome::TimedOut { attempts }
            }
        }
    }

    /// Execute a blocking operation with retry logic
    ///
    /// Each attempt runs inside [`guard::try_run`], so a panicking attempt
    /// counts as a failure. The loop ends on the first success, when a
    /// bounded budget reaches zero, or when cancellation or the time limit
    /// stops it. There is no pause after the final attempt.
    pub fn run<T, E, F>(&mut self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Result<T, E>,
        E: From<RecoveredPanic> + 'static,
        O: FailureObserver<E>,
        S: Sleeper,
    {
        let started = Instant::now();
        let mut remaining = self.budget;
        let mut attempts = 0;

        while remaining != RetryBudget::Attempts(0) {
            if let Some(halt) = self.check_halt(started.elapsed()) {
                return self.halted::<T, E>(halt, attempts);
            }

            if let RetryBudget::Attempts(left) = &mut remaining {
                *left -= 1;
            }
            attempts += 1;

            self.observer.on_attempt_start(attempts);
            tracing::trace!(attempt = attempts, "running attempt");

            match guard::try_run(&mut op) {
                Ok(value) => {
                    self.observer.on_success(attempts, started.elapsed());
                    return RetryOutcome::Succeeded { value, attempts };
                }
                Err(err) => {
                    self.observer.on_failure(attempts, err);

                    if remaining != RetryBudget::Attempts(0) {
                        let pause = self.pause_for(started.elapsed());
                        tracing::trace!(
                            attempt = attempts,
                            delay_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                            "waiting before next attempt"
                        );
                        self.sleeper.sleep(pause, &self.cancel);
                    }
                }
            }
        }

        self.observer.on_exhausted(attempts);
        RetryOutcome::Exhausted { attempts }
    }

    /// Execute an async operation with retry logic
    ///
    /// Same loop as [`run`](Self::run), driven by tokio: pauses use
    /// `tokio::time::sleep` and end early when the cancellation token fires.
    /// The configured [`Sleeper`] is not used.
    pub async fn run_async<T, E, F, Fut>(&mut self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RecoveredPanic> + 'static,
        O: FailureObserver<E>,
    {
        let started = tokio::time::Instant::now();
        let mut remaining = self.budget;
        let mut attempts = 0;

        while remaining != RetryBudget::Attempts(0) {
            if let Some(halt) = self.check_halt(started.elapsed()) {
                return self.halted::<T, E>(halt, attempts);
            }

            if let RetryBudget::Attempts(left) = &mut remaining {
                *left -= 1;
            }
            attempts += 1;

            self.observer.on_attempt_start(attempts);
            tracing::trace!(attempt = attempts, "running attempt");

            match guard::try_run_async(&mut op).await {
                Ok(value) => {
                    self.observer.on_success(attempts, started.elapsed());
                    return RetryOutcome::Succeeded { value, attempts };
                }
                Err(err) => {
                    self.observer.on_failure(attempts, err);

                    if remaining != RetryBudget::Attempts(0) {
                        let pause = self.pause_for(started.elapsed());
                        tracing::trace!(
                            attempt = attempts,
                            delay_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                            "waiting before next attempt"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(pause) => {}
                            _ = self.cancel.cancelled() => {}
                        }
                    }
                }
            }
        }

        self.observer.on_exhausted(attempts);
        RetryOutcome::Exhausted { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::observer::StatsObserver;
    use crate::retry::sleeper::RecordingSleeper;

    #[derive(Debug, thiserror::Error)]
    enum DialError {
        #[error("dial failed")]
        Failed,
        #[error(transparent)]
        Recovered(#[from] RecoveredPanic),
    }

    #[test]
    fn test_effective_period() {
        assert_eq!(effective_period(None), Duration::from_secs(5));
        assert_eq!(effective_period(Some(Duration::ZERO)), Duration::from_secs(5));
        assert_eq!(
            effective_period(Some(Duration::from_millis(10))),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_budget_from_signed() {
        assert_eq!(RetryBudget::from_signed(-1), RetryBudget::Unbounded);
        assert_eq!(RetryBudget::from(i64::MIN), RetryBudget::Unbounded);
        assert_eq!(RetryBudget::from_signed(0), RetryBudget::Attempts(0));
        assert_eq!(RetryBudget::from_signed(4), RetryBudget::Attempts(4));
        assert!(RetryBudget::Unbounded.is_unbounded());
    }

    #[test]
    fn test_builder_defaults() {
        let retrier = Retrier::builder().build();

        assert_eq!(retrier.budget(), RetryBudget::Attempts(3));
        assert_eq!(retrier.period(), DEFAULT_PERIOD);
        assert!(!retrier.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_builder_zero_period_falls_back() {
        let retrier = Retrier::builder().period(Duration::ZERO).build();
        assert_eq!(retrier.period(), DEFAULT_PERIOD);
    }

    #[test]
    fn test_immediate_success() {
        let stats = StatsObserver::new();
        let sleeper = RecordingSleeper::new();

        let outcome = Retrier::builder()
            .retries(3)
            .observer(stats.clone())
            .sleeper(sleeper.clone())
            .build()
            .run(|| Ok::<_, DialError>("ready"));

        assert_eq!(
            outcome,
            RetryOutcome::Succeeded {
                value: "ready",
                attempts: 1
            }
        );
        assert_eq!(stats.failures(), 0);
        assert_eq!(stats.successes(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn test_exhausted_without_trailing_pause() {
        let stats = StatsObserver::new();
        let sleeper = RecordingSleeper::new();

        let outcome: RetryOutcome<()> = Retrier::builder()
            .retries(3)
            .period(Duration::from_millis(10))
            .observer(stats.clone())
            .sleeper(sleeper.clone())
            .build()
            .run(|| Err(DialError::Failed));

        assert!(outcome.is_exhausted());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(stats.attempt_starts(), 3);
        assert_eq!(stats.failures(), 3);
        assert_eq!(stats.exhaustions(), 1);
        assert_eq!(sleeper.pauses(), vec![Duration::from_millis(10); 2]);
    }

    #[test]
    fn test_panicking_attempt_counts_as_failure() {
        let mut seen = Vec::new();
        let mut calls = 0;

        let outcome = Retrier::builder()
            .retries(2)
            .observer(|err: DialError| seen.push(err.to_string()))
            .sleeper(RecordingSleeper::new())
            .build()
            .run(|| {
                calls += 1;
                if calls == 1 {
                    panic!("first call explodes");
                }
                Ok::<_, DialError>(calls)
            });

        assert_eq!(outcome.into_value(), Some(2));
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("first call explodes"));
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let stats = StatsObserver::new();

        let outcome: RetryOutcome<()> = Retrier::builder()
            .retries(-1)
            .observer(stats.clone())
            .cancellation(token)
            .build()
            .run(|| -> Result<(), DialError> { unreachable!("cancelled loops never attempt") });

        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 0 });
        assert_eq!(stats.cancellations(), 1);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome: RetryOutcome<u8> = RetryOutcome::TimedOut { attempts: 4 };

        assert!(outcome.is_timed_out());
        assert!(!outcome.is_success());
        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.attempts(), 4);
        assert_eq!(outcome.into_value(), None);
    }
}
