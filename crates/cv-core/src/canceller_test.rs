use super::*;
use std::time::Duration;

#[test]
fn test_cancel_fires_once() {
    let canceller = Canceller::new();
    assert!(!canceller.is_cancelled());
    assert!(canceller.cancel());
    assert!(!canceller.cancel());
    assert!(canceller.is_cancelled());
}

#[test]
fn test_clones_share_state() {
    let canceller = Canceller::new();
    let clone = canceller.clone();
    clone.cancel();
    assert!(canceller.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_resolves_immediately_when_already_fired() {
    let canceller = Canceller::new();
    canceller.cancel();
    tokio::time::timeout(Duration::from_secs(1), canceller.cancelled())
        .await
        .expect("already cancelled");
}

#[tokio::test]
async fn test_cancelled_wakes_waiter() {
    let canceller = Canceller::new();
    let waiter = {
        let canceller = canceller.clone();
        tokio::spawn(async move { canceller.cancelled().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    canceller.cancel();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter woke up")
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_pending_until_fired() {
    let canceller = Canceller::new();
    let result = tokio::time::timeout(Duration::from_millis(20), canceller.cancelled()).await;
    assert!(result.is_err());
}
