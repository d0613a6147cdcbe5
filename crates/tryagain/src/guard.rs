//! Panic interception for a single operation
//!
//! The guard runs an operation once and turns any panic raised inside it into
//! an ordinary `Err`. Callers of [`try_run`] and [`try_run_async`] never see
//! an unwinding panic.
//!
//! Three kinds of failure come out of the guard:
//!
//! - an `Err` returned by the operation, passed through unchanged
//! - a panic whose payload is already the failure type `E`, returned as-is
//! - any other panic, wrapped into [`RecoveredPanic`] and converted into `E`

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use thiserror::Error;

/// Prefix carried by every failure synthesized from an unknown panic payload
pub const RECOVERED_PREFIX: &str = "RECOVERED, UNKNOWN ERROR";

/// A panic whose payload was not a failure value
///
/// The payload is rendered to text: the panic message for `&str` and
/// `String` payloads, a placeholder for anything else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("RECOVERED, UNKNOWN ERROR: {payload}")]
pub struct RecoveredPanic {
    payload: String,
}

impl RecoveredPanic {
    /// Create a recovered panic from an already rendered payload
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Render a raw panic payload
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let rendered = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self::new(rendered)
    }

    /// The rendered panic payload
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Run `op` once, converting a panic into a failure
///
/// # Example
///
/// ```rust
/// use tryagain::guard::{try_run, RecoveredPanic};
///
/// let result: Result<(), RecoveredPanic> = try_run(|| panic!("boom"));
/// let err = result.unwrap_err();
/// assert!(err.to_string().contains("boom"));
/// ```
pub fn try_run<T, E, F>(op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RecoveredPanic> + 'static,
{
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => Err(recover(payload)),
    }
}

/// Run a future-producing operation once, converting a panic into a failure
///
/// Panics raised while calling `op` and while polling the returned future are
/// both intercepted.
pub async fn try_run_async<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<RecoveredPanic> + 'static,
{
    let fut = match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(fut) => fut,
        Err(payload) => return Err(recover(payload)),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(recover(payload)),
    }
}

/// Turn a panic payload into a failure value
///
/// A payload that already is an `E` is handed back without re-wrapping.
pub(crate) fn recover<E>(payload: Box<dyn Any + Send>) -> E
where
    E: From<RecoveredPanic> + 'static,
{
    match payload.downcast::<E>() {
        Ok(err) => {
            tracing::debug!("recovered panic carrying a failure value");
            *err
        }
        Err(payload) => {
            let recovered = RecoveredPanic::from_payload(payload.as_ref());
            tracing::debug!(payload = %recovered.payload(), "recovered panic with unknown payload");
            E::from(recovered)
        }
    }
}
