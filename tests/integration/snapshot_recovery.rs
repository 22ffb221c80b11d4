//! Save and restore of the in-memory backend across restarts

use metric_keeper::storage::{BackendKind, MemoryBackend, MetricStore, SnapshotFile, select_backend};
use metric_keeper::Metric;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_gauges_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = memory_config(&dir);

    let first = select_backend(&config).await;
    assert_eq!(first.kind, BackendKind::Memory);
    first.store.update("gauge", "temp", "36.6").await.unwrap();
    first.store.update("gauge", "load", "0.25").await.unwrap();
    first.shutdown().await;

    let second = select_backend(&config).await;
    assert_eq!(second.store.value("gauge", "temp").await.unwrap(), "36.6");
    assert_eq!(second.store.value("gauge", "load").await.unwrap(), "0.25");
    second.shutdown().await;
}

#[tokio::test]
async fn test_counter_total_becomes_new_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let config = memory_config(&dir);

    let first = select_backend(&config).await;
    first.store.update("counter", "hits", "4").await.unwrap();
    first.store.update("counter", "hits", "3").await.unwrap();
    first.shutdown().await;

    let second = select_backend(&config).await;
    assert_eq!(second.store.value("counter", "hits").await.unwrap(), "7");

    second.store.update("counter", "hits", "1").await.unwrap();
    assert_eq!(second.store.value("counter", "hits").await.unwrap(), "8");
    second.shutdown().await;
}

#[tokio::test]
async fn test_restore_disabled_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = memory_config(&dir);

    let first = select_backend(&config).await;
    first.store.update("counter", "hits", "4").await.unwrap();
    first.shutdown().await;

    config.restore = false;
    let second = select_backend(&config).await;
    assert!(second.store.get_all().await.unwrap().is_empty());

    // The empty store overwrites the old snapshot on shutdown
    second.shutdown().await;
    let saved = SnapshotFile::new(dir.path().join("metrics.json")).load().await.unwrap();
    assert!(saved.is_empty());
}

#[tokio::test]
async fn test_save_now_through_handle() {
    let dir = tempfile::tempdir().unwrap();
    let config = memory_config(&dir);

    let selected = select_backend(&config).await;
    selected.store.set(Metric::counter("hits", 2)).await.unwrap();

    let snapshot = selected.snapshot().unwrap();
    assert_eq!(snapshot.save_now().await.unwrap(), 1);
    assert_eq!(snapshot.get_stats().await.unwrap().save_count, 1);

    selected.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = memory_config(&dir);
    std::fs::write(dir.path().join("metrics.json"), "{not json").unwrap();

    let selected = select_backend(&config).await;
    assert!(selected.store.get_all().await.unwrap().is_empty());
    selected.shutdown().await;
}

#[tokio::test]
async fn test_legacy_array_snapshot_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(
        &path,
        r#"[{"id":"hits","type":"counter","delta":3},{"id":"temp","type":"gauge","value":1.5}]"#,
    )
    .unwrap();

    let store = MemoryBackend::new();
    assert_eq!(SnapshotFile::new(&path).restore(&store, true).await, 2);
    assert_eq!(store.value("counter", "hits").await.unwrap(), "3");
    assert_eq!(store.value("gauge", "temp").await.unwrap(), "1.5");
}
