use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

#[tokio::test]
async fn test_deadline_retried_exactly_once() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<u32, DbError> = retry_once_on_deadline(move || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Err(DbError::DeadlineExceeded { timeout_ms: 10 })
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_deadline_is_final() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), DbError> = retry_once_on_deadline(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(DbError::DeadlineExceeded { timeout_ms: 10 })
    })
    .await;

    assert!(matches!(result, Err(DbError::DeadlineExceeded { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_other_errors_pass_through_deadline_rule() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), DbError> = retry_once_on_deadline(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(DbError::Busy("conflict".to_string()))
    })
    .await;

    assert!(matches!(result, Err(DbError::Busy(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_busy_retried_until_success() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<&str, DbError> = fast_policy(5)
        .retry(move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::Busy("conflict".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_busy_gives_up_after_budget() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), DbError> = fast_policy(3)
        .retry(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("conflict".to_string()))
        })
        .await;

    assert!(matches!(result, Err(DbError::Busy(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_non_busy_not_retried() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), DbError> = fast_policy(5)
        .retry(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::ExecutionError("syntax".to_string()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_backoff_is_capped() {
    let policy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
    };
    assert!(policy.backoff(0) >= Duration::from_millis(50));
    assert!(policy.backoff(0) <= Duration::from_millis(62));
    // 50 * 2^6 is far past the cap; jitter adds at most a quarter.
    assert!(policy.backoff(6) <= Duration::from_millis(250));
}

#[test]
fn test_policy_from_config() {
    let policy = RetryPolicy::from(&RetryConfig {
        max_attempts: 0,
        base_delay_ms: 5,
        max_delay_ms: 10,
    });
    assert_eq!(policy.max_attempts, 1);
    assert_eq!(policy.base_delay, Duration::from_millis(5));
    assert_eq!(RetryPolicy::none().max_attempts, 1);
}
