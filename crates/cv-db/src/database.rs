//! Connection handle onto the replicated database.
//!
//! [`Database`] serializes access to one DuckDB [`Connection`] behind a
//! `Mutex` and runs every unit of work on tokio's blocking pool. It is the
//! home of the transaction retry rules: deadline-exceeded transactions are
//! retried once, and process-lifetime transactions also back off on
//! contention.

use crate::error::DbError;
use crate::retry::{retry_once_on_deadline, RetryPolicy, Retryable};
use crate::transaction::with_transaction;
use cv_core::Canceller;
use duckdb::Connection;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    retry: RetryPolicy,
    shutdown: Canceller,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("retry", &self.retry)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Database {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
            shutdown: Canceller::new(),
        }
    }

    /// Replace the busy/lock backoff policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tie the handle to a process shutdown signal. Once it fires, work is
    /// attempted once and never retried on contention.
    pub fn with_shutdown(mut self, shutdown: Canceller) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run `work` against the connection without opening a transaction.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            work(&guard)
        })
        .await
        .map_err(|e| DbError::Internal(format!("database task failed: {e}")))?;
        result
    }

    /// Like [`run`](Self::run), failing with [`DbError::DeadlineExceeded`]
    /// if `timeout` elapses first.
    pub async fn run_with_timeout<F, T, E>(
        &self,
        timeout: Option<Duration>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let Some(limit) = timeout else {
            return self.run(work).await;
        };

        match tokio::time::timeout(limit, self.run(work)).await {
            Ok(result) => result,
            Err(_) => Err(deadline_exceeded(limit).into()),
        }
    }

    /// Apply the busy/lock backoff to `work`, unless the process is shutting
    /// down, in which case `work` runs once.
    pub async fn retry<F, Fut, T, E>(&self, mut work: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        if self.shutdown.is_cancelled() {
            return work().await;
        }

        self.retry.retry(work).await
    }

    /// Execute `work` in a transaction with no deadline of its own.
    ///
    /// Contention is retried with backoff; a deadline exceeded inside the
    /// engine is retried once.
    pub async fn transaction<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: Fn(&Connection) -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: From<DbError> + Retryable + Display + Send + 'static,
    {
        let work = Arc::new(work);
        self.retry(|| self.transaction_retrying_deadline(Arc::clone(&work), None))
            .await
    }

    /// Execute `work` in a transaction bounded by `timeout`.
    ///
    /// The caller owns the timeout budget, so contention is not retried here;
    /// only a deadline overrun gets its single extra attempt. An attempt that
    /// overruns never commits: its blocking task rolls back once `work`
    /// returns, even though the caller has already been answered.
    pub async fn transaction_with_timeout<F, T, E>(
        &self,
        timeout: Duration,
        work: F,
    ) -> Result<T, E>
    where
        F: Fn(&Connection) -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: From<DbError> + Retryable + Display + Send + 'static,
    {
        self.transaction_retrying_deadline(Arc::new(work), Some(timeout))
            .await
    }

    async fn transaction_retrying_deadline<F, T, E>(
        &self,
        work: Arc<F>,
        timeout: Option<Duration>,
    ) -> Result<T, E>
    where
        F: Fn(&Connection) -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: From<DbError> + Retryable + Display + Send + 'static,
    {
        retry_once_on_deadline(|| self.transaction_attempt(Arc::clone(&work), timeout)).await
    }

    async fn transaction_attempt<F, T, E>(
        &self,
        work: Arc<F>,
        timeout: Option<Duration>,
    ) -> Result<T, E>
    where
        F: Fn(&Connection) -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        self.run_with_timeout(timeout, move |conn| -> Result<T, E> {
            check_deadline(deadline)?;
            with_transaction(conn, |tx| -> Result<T, E> {
                let value = work(tx)?;
                check_deadline(deadline)?;
                Ok(value)
            })
        })
        .await
    }
}

fn deadline_exceeded(limit: Duration) -> DbError {
    DbError::DeadlineExceeded {
        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Fail once `deadline` has passed, so a timed-out attempt still holding the
/// connection does not start or commit.
fn check_deadline(deadline: Option<(Instant, Duration)>) -> Result<(), DbError> {
    match deadline {
        Some((at, limit)) if Instant::now() >= at => Err(deadline_exceeded(limit)),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "database_test.rs"]
mod tests;
