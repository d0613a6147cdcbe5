//! # tryagain
//!
//! Panic-safe retry utility providing:
//! - A guard that turns panics inside an operation into ordinary errors
//! - A retry loop with a bounded or unbounded budget and a fixed period
//! - Failure observers, including structured logging through `tracing`
//! - Optional cancellation and overall time limits
//! - YAML configuration for retry settings

pub mod config;
pub mod error;
pub mod guard;
pub mod retry;

pub use config::RetryConfig;
pub use error::{Error, Result};
pub use guard::{try_run, try_run_async, RecoveredPanic};
pub use retry::{retry, Retrier, RetryBudget, RetryOutcome};
