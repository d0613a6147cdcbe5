//! Cooperative cancellation for retry loops

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A cloneable flag that stops a retry loop
///
/// All clones share the same state. Cancelling is permanent and wakes any
/// loop currently sleeping between attempts, blocking or async. Async waits
/// go through [`tokio_util::sync::CancellationToken`]; blocking waits park on
/// a condvar that [`cancel`](Self::cancel) signals.
///
/// # Example
///
/// ```rust
/// use tryagain::retry::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
///
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    token: tokio_util::sync::CancellationToken,
    wakeup: Arc<Wakeup>,
}

#[derive(Debug, Default)]
struct Wakeup {
    lock: Mutex<()>,
    signal: Condvar,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every loop observing this token
    pub fn cancel(&self) {
        if self.token.is_cancelled() {
            return;
        }

        // Hold the lock so a blocking waiter cannot miss the signal between
        // its flag check and its wait.
        let guard = self.lock();
        self.token.cancel();
        drop(guard);

        tracing::debug!("cancellation requested");
        self.wakeup.signal.notify_all();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Block the current thread for `timeout` or until cancelled
    ///
    /// A timeout too large to be represented as a deadline waits until
    /// cancelled. Returns `true` if the wait ended because of cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock();

        while !self.token.is_cancelled() {
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.wakeup
                        .signal
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .wakeup
                    .signal
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        true
    }

    /// Wait asynchronously until cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.wakeup.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel();
        clone.cancel();

        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let token = CancellationToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_timeout_wakes_on_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();

        let started = Instant::now();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(token.wait_timeout(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        canceller.join().unwrap();
    }

    #[test]
    fn test_wait_without_deadline_wakes_on_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(token.wait_timeout(Duration::MAX));
        canceller.join().unwrap();
    }

    #[test]
    fn test_wait_after_cancel_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        assert!(token.wait_timeout(Duration::MAX));
    }

    #[tokio::test]
    async fn test_cancelled_future_completes() {
        let token = CancellationToken::new();
        let remote = token.clone();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::task::yield_now().await;
        remote.cancel();

        waiter.await.unwrap();
    }
}
