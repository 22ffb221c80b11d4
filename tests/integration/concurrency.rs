//! Concurrency tests
//!
//! These tests verify that concurrent writers never lose an update:
//! - Disjoint keys written from many tasks
//! - Increments racing on the same counter
//! - Readers running alongside writers

use std::sync::Arc;

use futures::future::join_all;

use metric_keeper::storage::{MemoryBackend, MetricStore};
use metric_keeper::{Metric, MetricKind};

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_keys_all_land() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let gauge = Metric::gauge(format!("g{i}"), i as f64 / 2.0).unwrap();
                    store.set(Metric::counter(format!("c{i}"), i)).await.unwrap();
                    store.set(gauge).await.unwrap();
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.get_all().await.unwrap().len(), 64, "{name}");
        assert_eq!(store.value("gauge", "g7").await.unwrap(), "3.5", "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_increments_sum_exactly() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        let tasks = (1..=20).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.set(Metric::counter("shared", i)).await })
        });

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let total = store.get(MetricKind::Counter, "shared").await.unwrap();
        assert_eq!(total.delta(), Some(210), "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_alongside_writers() {
    let store = Arc::new(MemoryBackend::new());
    store.set(Metric::counter("hits", 0)).await.unwrap();

    let writers: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.update("counter", "hits", "1").await })
        })
        .collect();

    let readers: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let value: i64 = store.value("counter", "hits").await.unwrap().parse().unwrap();
                assert!((0..=50).contains(&value));
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap().unwrap();
    }
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(store.value("counter", "hits").await.unwrap(), "50");
}
