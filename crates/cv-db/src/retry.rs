//! Retry policies for work executed against the replicated engine.
//!
//! Two independent rules apply:
//!
//! - [`retry_once_on_deadline`]: a transaction that exceeded its deadline most
//!   likely raced a leadership change. By the time the deadline fires a new
//!   leader should be elected, so the transaction is attempted exactly once
//!   more.
//! - [`RetryPolicy::retry`]: routine contention ([`Retryable::is_busy`]) is
//!   absorbed with an exponential, jittered backoff for callers without a
//!   deadline of their own.

use crate::error::DbError;
use cv_core::RetryConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification of errors that the retry policies act on.
///
/// Wrapper error types delegate to the [`DbError`] they carry.
pub trait Retryable {
    /// The engine rejected the work because of contention.
    fn is_busy(&self) -> bool;

    /// The work did not finish before its deadline.
    fn is_deadline_exceeded(&self) -> bool;
}

impl Retryable for DbError {
    fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }

    fn is_deadline_exceeded(&self) -> bool {
        matches!(self, DbError::DeadlineExceeded { .. })
    }
}

/// Busy/lock backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based): exponential growth capped
    /// at `max_delay`, plus up to 25% random jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.min(8);
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let max_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        let without_jitter = base_ms.saturating_mul(exp).min(max_ms);
        let jitter_ms = rand::thread_rng().gen_range(0..=without_jitter / 4);
        Duration::from_millis(without_jitter.saturating_add(jitter_ms))
    }

    /// Run `work`, retrying while it fails with a busy error and the attempt
    /// budget lasts. Any other error is returned untouched.
    pub async fn retry<F, Fut, T, E>(&self, mut work: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0;
        loop {
            match work().await {
                Err(err) if err.is_busy() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "Database busy (attempt {}/{}), retrying in {delay:?}: {err}",
                        attempt + 1,
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Run `work`; if it exceeds its deadline, run it exactly once more.
pub async fn retry_once_on_deadline<F, Fut, T, E>(mut work: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    match work().await {
        Err(err) if err.is_deadline_exceeded() => {
            log::warn!("Transaction timed out. Retrying once: {err}");
            work().await
        }
        result => result,
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
