//! Integration tests for the lease-based lock coordinator

use checkoutfs::error::LockError;
use checkoutfs::lock::{LeaseLockCoordinator, LockCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

fn coordinator() -> Arc<LeaseLockCoordinator> {
    Arc::new(LeaseLockCoordinator::new(Duration::from_millis(100)))
}

fn sid(name: &str) -> String {
    name.to_string()
}

/// Test that a second acquire blocks until the holder releases
#[tokio::test]
async fn test_acquire_blocks_until_release() {
    let locks = coordinator();
    locks.acquire("/f", &sid("s1")).await.unwrap();

    let waiter = {
        let locks = Arc::clone(&locks);
        tokio::spawn(async move { locks.acquire("/f", &sid("s2")).await })
    };
    sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert_eq!(locks.queue_len("/f"), 1);

    locks.release("/f", &sid("s1")).await.unwrap();
    let lock = timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(lock.holder, "s2");
    assert_eq!(locks.holder("/f"), Some(sid("s2")));
}

/// Test that waiters are granted in arrival order
#[tokio::test]
async fn test_waiters_granted_fifo() {
    let locks = coordinator();
    locks.acquire("/f", &sid("holder")).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for (position, name) in ["w1", "w2", "w3"].into_iter().enumerate() {
        let locks_for_task = Arc::clone(&locks);
        let tx = tx.clone();
        tokio::spawn(async move {
            let session = sid(name);
            locks_for_task.acquire("/f", &session).await.unwrap();
            tx.send(session.clone()).unwrap();
            locks_for_task.release("/f", &session).await.unwrap();
        });
        while locks.queue_len("/f") <= position {
            sleep(Duration::from_millis(5)).await;
        }
    }

    locks.release("/f", &sid("holder")).await.unwrap();
    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
    }
    assert_eq!(order, vec!["w1", "w2", "w3"]);
    assert!(!locks.is_locked("/f").await.unwrap());
}

/// Test that only the holder may release
#[tokio::test]
async fn test_release_by_non_holder() {
    let locks = coordinator();
    locks.acquire("/f", &sid("s1")).await.unwrap();

    let err = locks.release("/f", &sid("s2")).await.unwrap_err();
    assert!(matches!(err, LockError::NotHeld { .. }));
    let err = locks.release("/unlocked", &sid("s1")).await.unwrap_err();
    assert!(matches!(err, LockError::NotHeld { .. }));
    assert_eq!(locks.holder("/f"), Some(sid("s1")));
}

/// Test that independent keys do not contend
#[tokio::test]
async fn test_distinct_keys_independent() {
    let locks = coordinator();
    locks.acquire("/a", &sid("s1")).await.unwrap();
    timeout(Duration::from_millis(200), locks.acquire("/b", &sid("s2")))
        .await
        .unwrap()
        .unwrap();
    assert!(locks.is_locked("/a").await.unwrap());
    assert!(locks.is_locked("/b").await.unwrap());
    assert!(!locks.is_locked("/c").await.unwrap());
}

/// Test that a detached session's lock passes on once its lease runs out
#[tokio::test]
async fn test_lease_expiry_hands_lock_to_waiter() {
    let locks = coordinator();
    let s1 = sid("s1");
    locks.attach(&s1);
    locks.acquire("/f", &s1).await.unwrap();

    let waiter = {
        let locks = Arc::clone(&locks);
        tokio::spawn(async move { locks.acquire("/f", &sid("s2")).await })
    };
    sleep(Duration::from_millis(20)).await;

    locks.detach(&s1);
    assert!(locks.expire_sessions(Instant::now()).is_empty());

    let expired = locks.expire_sessions(Instant::now() + Duration::from_millis(150));
    assert_eq!(expired, vec![s1.clone()]);

    let lock = timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(lock.holder, "s2");
}

/// Test that an expired session's queued request fails
#[tokio::test]
async fn test_lease_expiry_fails_queued_request() {
    let locks = coordinator();
    locks.acquire("/f", &sid("holder")).await.unwrap();

    let queued = sid("queued");
    locks.attach(&queued);
    let waiter = {
        let locks = Arc::clone(&locks);
        let queued = queued.clone();
        tokio::spawn(async move { locks.acquire("/f", &queued).await })
    };
    sleep(Duration::from_millis(20)).await;
    locks.detach(&queued);
    locks.expire_sessions(Instant::now() + Duration::from_secs(1));

    let result = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert!(matches!(result, Err(LockError::SessionExpired(_))));
    assert_eq!(locks.holder("/f"), Some(sid("holder")));
    assert_eq!(locks.queue_len("/f"), 0);
}
