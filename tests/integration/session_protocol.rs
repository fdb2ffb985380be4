//! Integration tests for the client checkout session over an in-process service

use super::test_utils::LocalService;
use checkoutfs::error::{ApiError, LockError};
use checkoutfs::session::{SessionState, MAX_FILE_BYTES};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Test the full open, write, close lifecycle
#[tokio::test]
async fn test_checkout_lifecycle() {
    let service = LocalService::new();
    let mut session = service.session();
    assert_eq!(session.state(), SessionState::Idle);

    let entry = session.open("/notes/today.txt").await.unwrap();
    assert_eq!(entry.virtual_path, "/notes/today.txt");
    assert_eq!(entry.size_bytes, 0);
    assert_eq!(session.state(), SessionState::Editing);
    assert_eq!(service.locks.holder("/notes/today.txt"), Some(session.id().clone()));

    session.write(0, b"hello world").unwrap();
    assert_eq!(session.read().unwrap(), b"hello world");
    assert_eq!(session.read_range(6, 100).unwrap(), b"world");

    let committed = session.close().await.unwrap();
    assert_eq!(committed.size_bytes, 11);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.entry().is_none());
    assert!(service.locks.holder("/notes/today.txt").is_none());
    assert_eq!(
        service.store().get_file("/notes/today.txt").unwrap(),
        b"hello world"
    );
}

/// Test that edits stay private until close
#[tokio::test]
async fn test_edits_invisible_before_close() {
    let service = LocalService::new();
    service.store().create_file("/doc.txt", b"original").unwrap();

    let mut session = service.session();
    session.open("/doc.txt").await.unwrap();
    assert_eq!(session.read().unwrap(), b"original");
    session.write(0, b"REVISED!").unwrap();

    assert_eq!(service.store().get_file("/doc.txt").unwrap(), b"original");
    session.close().await.unwrap();
    assert_eq!(service.store().get_file("/doc.txt").unwrap(), b"REVISED!");
}

/// Test that a session holds at most one open file
#[tokio::test]
async fn test_second_open_denied() {
    let service = LocalService::new();
    let mut session = service.session();
    session.open("/a.txt").await.unwrap();

    let err = session.open("/b.txt").await.unwrap_err();
    assert!(matches!(err, ApiError::LockError(LockError::Denied { .. })));
    assert_eq!(session.state(), SessionState::Editing);
    assert_eq!(session.entry().unwrap().virtual_path, "/a.txt");
    assert!(service.locks.holder("/b.txt").is_none());
}

/// Test that a second client waits for the first to check the file in
#[tokio::test]
async fn test_second_client_waits_for_close() {
    let service = LocalService::new();
    let mut first = service.session();
    first.open("/shared.txt").await.unwrap();
    first.write(0, b"from first").unwrap();

    let second = service.session();
    let pending = tokio::spawn(async move {
        let mut second = second;
        let content = second
            .open("/shared.txt")
            .await
            .map(|_| second.read().map(|bytes| bytes.to_vec()));
        (second, content)
    });

    sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());
    assert_eq!(service.locks.queue_len("/shared.txt"), 1);

    first.close().await.unwrap();
    let (second, content) = timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(content.unwrap().unwrap(), b"from first");
    assert_eq!(second.state(), SessionState::Editing);
    assert_eq!(service.locks.holder("/shared.txt"), Some(second.id().clone()));
}

/// Test that writing past the end zero-fills the gap
#[tokio::test]
async fn test_write_past_end_zero_fills() {
    let service = LocalService::new();
    service.store().create_file("/sparse.bin", b"ab").unwrap();

    let mut session = service.session();
    session.open("/sparse.bin").await.unwrap();
    session.write(5, b"xy").unwrap();
    assert_eq!(session.read().unwrap(), b"ab\0\0\0xy");
    assert_eq!(session.entry().unwrap().size_bytes, 7);

    let committed = session.close().await.unwrap();
    assert_eq!(committed.size_bytes, 7);
    assert_eq!(service.store().get_file("/sparse.bin").unwrap(), b"ab\0\0\0xy");
}

/// Test that a failed commit keeps the lock and can be retried
#[tokio::test]
async fn test_failed_commit_stays_committing() {
    let service = LocalService::new();
    let mut session = service.session();
    session.open("/fragile.txt").await.unwrap();
    session.write(0, b"precious").unwrap();

    service.store().delete_file("/fragile.txt").unwrap();
    let err = session.close().await.unwrap_err();
    assert!(matches!(err, ApiError::Remote(_)));
    assert_eq!(session.state(), SessionState::Committing);
    assert_eq!(service.locks.holder("/fragile.txt"), Some(session.id().clone()));
    assert!(session.write(0, b"more").is_err());

    service.store().open("/fragile.txt").unwrap();
    let committed = session.close().await.unwrap();
    assert_eq!(committed.size_bytes, 8);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(service.store().get_file("/fragile.txt").unwrap(), b"precious");
    assert!(service.locks.holder("/fragile.txt").is_none());
}

/// Test that discard drops edits and releases the lock
#[tokio::test]
async fn test_discard_releases_without_commit() {
    let service = LocalService::new();
    service.store().create_file("/keep.txt", b"keep").unwrap();

    let mut session = service.session();
    session.open("/keep.txt").await.unwrap();
    session.write(0, b"lose").unwrap();
    session.discard().await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(service.store().get_file("/keep.txt").unwrap(), b"keep");
    assert!(service.locks.holder("/keep.txt").is_none());
}

/// Test that delete removes the file under its lock
#[tokio::test]
async fn test_delete_file() {
    let service = LocalService::new();
    service.store().create_file("/gone.txt", b"bye").unwrap();

    let mut session = service.session();
    session.delete("/gone.txt").await.unwrap();
    assert!(service.store().stat("/gone.txt").is_err());
    assert!(service.locks.holder("/gone.txt").is_none());

    let err = session.delete("/gone.txt").await.unwrap_err();
    assert!(matches!(err, ApiError::Remote(_)));
    assert!(service.locks.holder("/gone.txt").is_none());
}

/// Test that buffer operations require an open file
#[tokio::test]
async fn test_operations_require_open_file() {
    let service = LocalService::new();
    let mut session = service.session();

    assert!(matches!(session.read(), Err(ApiError::InvalidState(_))));
    assert!(matches!(session.write(0, b"x"), Err(ApiError::InvalidState(_))));
    assert!(matches!(session.close().await, Err(ApiError::InvalidState(_))));
    assert!(matches!(session.discard().await, Err(ApiError::InvalidState(_))));
}

/// Test that paths are normalized before locking
#[tokio::test]
async fn test_open_normalizes_path() {
    let service = LocalService::new();
    let mut session = service.session();
    let entry = session.open("/dir//file.txt/").await.unwrap();
    assert_eq!(entry.virtual_path, "/dir/file.txt");
    assert_eq!(service.locks.holder("/dir/file.txt"), Some(session.id().clone()));
    session.discard().await.unwrap();
}

/// Test that writes beyond the file size limit are refused, not applied
#[tokio::test]
async fn test_write_offset_out_of_range() {
    let service = LocalService::new();
    let mut session = service.session();
    session.open("/bounded.txt").await.unwrap();
    session.write(0, b"ok").unwrap();

    assert!(matches!(
        session.write(usize::MAX, b"x"),
        Err(ApiError::InvalidState(_))
    ));
    assert!(matches!(
        session.write(MAX_FILE_BYTES, b"x"),
        Err(ApiError::InvalidState(_))
    ));
    assert_eq!(session.read().unwrap(), b"ok");
    assert_eq!(session.entry().unwrap().size_bytes, 2);
    assert_eq!(session.state(), SessionState::Editing);

    let committed = session.close().await.unwrap();
    assert_eq!(committed.size_bytes, 2);
}
