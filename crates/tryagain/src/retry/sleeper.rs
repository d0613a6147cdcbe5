//! Pauses between attempts of the blocking retry loop

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::cancel::CancellationToken;

/// Waits out the period between two attempts
///
/// The blocking loop calls [`sleep`](Sleeper::sleep) only when another
/// attempt will follow. Implementations should return early once `cancel`
/// fires.
pub trait Sleeper {
    /// Pause for `period` or until `cancel` is triggered
    fn sleep(&mut self, period: Duration, cancel: &CancellationToken);
}

/// Blocks the calling thread, waking early on cancellation
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, period: Duration, cancel: &CancellationToken) {
        cancel.wait_timeout(period);
    }
}

/// Records every requested pause and returns immediately
///
/// Clones share the same record, so a test can keep one handle and give the
/// other to the loop.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pauses requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of pauses requested so far
    pub fn count(&self) -> usize {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, period: Duration, _cancel: &CancellationToken) {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(period);
    }
}
