//! Fixed-period retry loop with panic recovery
//!
//! This module runs a fallible operation until it succeeds or its attempt
//! budget runs out, pausing a fixed period between attempts. Every attempt
//! runs inside the panic guard from [`crate::guard`], so a panicking attempt
//! is just another failure.
//!
//! # Features
//!
//! - Bounded or unbounded attempt budgets
//! - A fixed pause between attempts, five seconds by default
//! - Observable failures via the `FailureObserver` trait or a plain closure
//! - Built-in `TracingObserver` for logging
//! - Optional cancellation token and overall time limit
//! - Blocking (`Retrier::run`) and tokio (`Retrier::run_async`) loops
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tryagain::guard::RecoveredPanic;
//! use tryagain::retry::{Retrier, TracingObserver};
//!
//! let outcome = Retrier::builder()
//!     .retries(-1)
//!     .period(Duration::from_secs(1))
//!     .observer(TracingObserver::new("open_socket"))
//!     .build()
//!     .run(|| -> Result<u16, RecoveredPanic> { Ok(8080) });
//!
//! assert!(outcome.is_success());
//! ```

mod cancel;
mod executor;
mod observer;
mod sleeper;

pub use cancel::CancellationToken;
pub use executor::{
    effective_period, retry, Retrier, RetrierBuilder, RetryBudget, RetryOutcome, DEFAULT_PERIOD,
};
pub use observer::{FailureObserver, NoOpObserver, OptionalObserver, StatsObserver, TracingObserver};
pub use sleeper::{RecordingSleeper, Sleeper, ThreadSleeper};
