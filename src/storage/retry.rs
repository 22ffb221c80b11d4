//! Bounded fixed-delay retry for durable backend round trips

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

/// Retry policy applied uniformly to every durable backend round trip
///
/// An operation is attempted at most `attempts` times with a fixed `delay`
/// between attempts. Only errors accepted by the predicate (connectivity
/// errors by default) are retried; anything else is returned immediately.
/// When the last attempt fails, the error is wrapped in
/// [`StorageError::RetryExhausted`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
    retryable: fn(&StorageError) -> bool,
}

impl RetryPolicy {
    /// A policy with at least one attempt
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            retryable: StorageError::is_retryable,
        }
    }

    /// Replace the retryable-error predicate
    pub fn with_predicate(mut self, retryable: fn(&StorageError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Upper bound of time spent sleeping between attempts
    pub fn worst_case_delay(&self) -> Duration {
        self.delay * (self.attempts - 1)
    }

    /// Run `operation`, retrying retryable failures
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> StorageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.retryable)(&err) {
                return Err(err);
            }

            if attempt >= self.attempts {
                warn!("{name}: giving up after {attempt} attempts: {err}");
                return Err(StorageError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            debug!(
                "{name}: attempt {attempt}/{} failed ({err}), retrying in {:?}",
                self.attempts, self.delay
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
