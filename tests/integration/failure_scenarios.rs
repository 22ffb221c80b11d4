//! Failure scenario tests
//!
//! These tests verify graceful degradation:
//! - Unreachable durable backend falls back to in-memory storage
//! - Retry gives up after the configured attempts
//! - Non-connectivity errors are never retried
//! - An unwritable snapshot path does not stop the service

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use metric_keeper::config::StorageConfig;
use metric_keeper::storage::{BackendKind, RetryPolicy, StorageError, select_backend};
use metric_keeper::MetricKind;

use crate::helpers::*;

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_unreachable_database_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("no-such-dir").join("metrics.db");

    let config = StorageConfig {
        database_dsn: Some(unreachable.to_string_lossy().into_owned()),
        connect_retries: 2,
        retry_delay_secs: 0,
        ..memory_config(&dir)
    };

    let selected = select_backend(&config).await;
    assert_eq!(selected.kind, BackendKind::Memory);
    assert!(selected.snapshot().is_some());

    selected.store.update("counter", "hits", "1").await.unwrap();
    selected.store.update("counter", "hits", "1").await.unwrap();
    assert_eq!(selected.store.value("counter", "hits").await.unwrap(), "2");

    // Health reports the missing durable backend
    assert_matches!(selected.store.ping().await, Err(StorageError::UnhealthyBackend(_)));

    selected.shutdown().await;
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_open_gives_up_after_configured_attempts() {
    use metric_keeper::storage::sqlite::SqliteBackend;

    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("no-such-dir").join("metrics.db");

    let policy = RetryPolicy::new(3, Duration::from_millis(5));
    let result = SqliteBackend::open(&unreachable.to_string_lossy(), policy).await;

    assert_matches!(
        result,
        Err(StorageError::RetryExhausted { attempts: 3, last }) if matches!(*last, StorageError::Connectivity(_))
    );
}

#[tokio::test]
async fn test_retry_counts_connectivity_failures() {
    let calls = &AtomicU32::new(0);

    let result: Result<(), _> = fast_retry()
        .run("flaky", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Connectivity("connection refused".to_string()))
        })
        .await;

    assert_matches!(result, Err(StorageError::RetryExhausted { attempts: 2, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_not_found_is_never_retried() {
    let calls = &AtomicU32::new(0);

    let result: Result<(), _> = fast_retry()
        .run("lookup", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::NotFound {
                kind: MetricKind::Counter,
                id: "hits".to_string(),
            })
        })
        .await;

    assert_matches!(result, Err(StorageError::NotFound { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unwritable_snapshot_path_keeps_serving() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        file_storage_path: Some(dir.path().join("no-such-dir").join("metrics.json")),
        ..memory_config(&dir)
    };

    let selected = select_backend(&config).await;
    selected.store.update("gauge", "temp", "20").await.unwrap();

    let snapshot = selected.snapshot().unwrap();
    assert!(snapshot.save_now().await.is_err());
    assert_eq!(snapshot.get_stats().await.unwrap().failed_saves, 1);

    assert_eq!(selected.store.value("gauge", "temp").await.unwrap(), "20");
    selected.shutdown().await;
}
