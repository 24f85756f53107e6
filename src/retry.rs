//! Retry with exponential backoff and error classification.
//!
//! Wraps any unit of work returning [`MigrationError`] on failure. Retryable
//! failures (see [`MigrationError::is_retryable`]) are replayed with a
//! doubling delay capped at `max_delay`; non-retryable failures propagate
//! immediately. A server-indicated Retry-After stretches the sleep when it
//! exceeds the computed backoff.

use crate::error::{MigrationError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff parameters for [`try_with`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Panics if `max_attempts` or `initial_delay` is zero — both are
    /// programming errors, not runtime conditions.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        assert!(max_attempts > 0, "max_attempts must be positive");
        assert!(
            !initial_delay.is_zero(),
            "initial_delay must be positive"
        );
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry `i` (1-indexed, after the first failure):
    /// `min(initial * 2^(i-1), max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Successful result plus how hard we had to work for it.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Total attempts made, including the successful one.
    pub attempts: u32,
    /// Replays after the first attempt.
    pub retries: u32,
}

/// Run `op`, replaying retryable failures per `policy`.
///
/// Cancellation interrupts the backoff sleep and suppresses further
/// attempts; an in-flight `op` future is left to finish on its own.
pub async fn try_with<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    try_with_report(policy, cancel, op).await.map(|o| o.value)
}

/// Like [`try_with`], but reports the attempt count alongside the value.
pub async fn try_with_report<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        match op().await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                    retries: attempt - 1,
                })
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let backoff = policy.delay_for(attempt);
                let delay = match err.retry_after() {
                    Some(hinted) => backoff.max(hinted),
                    None => backoff,
                };
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }
}
