//! Every backend honors the same merge contract

use assert_matches::assert_matches;
use metric_keeper::storage::StorageError;
use metric_keeper::{Metric, MetricError, MetricKind};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_counter_sums_across_backends() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        for delta in ["1", "2", "-4", "10"] {
            store.update("counter", "requests", delta).await.unwrap();
        }

        assert_eq!(store.value("counter", "requests").await.unwrap(), "9", "{name}");
    }
}

#[tokio::test]
async fn test_gauge_last_write_wins_across_backends() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        store.update("gauge", "temp", "36.6").await.unwrap();
        store.update("gauge", "temp", "-1.25").await.unwrap();

        assert_eq!(store.value("gauge", "temp").await.unwrap(), "-1.25", "{name}");
    }
}

#[tokio::test]
async fn test_kind_names_are_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        store.update("COUNTER", "hits", "3").await.unwrap();
        assert_eq!(store.value("Counter", "hits").await.unwrap(), "3", "{name}");
    }
}

#[tokio::test]
async fn test_not_found_and_invalid_input() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        store.update("counter", "hits", "1").await.unwrap();

        assert_matches!(
            store.get(MetricKind::Gauge, "hits").await,
            Err(StorageError::NotFound { kind: MetricKind::Gauge, .. }),
            "{}", name
        );
        assert_matches!(
            store.value("timer", "hits").await,
            Err(StorageError::Metric(MetricError::InvalidKind(_))),
            "{}", name
        );
        assert_matches!(
            store.update("counter", "hits", "1.5").await,
            Err(StorageError::Metric(MetricError::InvalidValue { .. })),
            "{}", name
        );
        assert_matches!(
            store.update("gauge", "temp", "warm").await,
            Err(StorageError::Metric(MetricError::InvalidValue { .. })),
            "{}", name
        );

        // Rejected updates leave the store untouched
        assert_eq!(store.value("counter", "hits").await.unwrap(), "1", "{name}");
    }
}

#[tokio::test]
async fn test_get_all_matches_individual_gets() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        store.set(Metric::counter("hits", 5)).await.unwrap();
        store.set(Metric::gauge("hits", 0.5).unwrap()).await.unwrap();
        store.set(Metric::gauge("load", 2.0).unwrap()).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 3, "{name}");

        for metric in all {
            let stored = store.get(metric.kind(), metric.id()).await.unwrap();
            assert_eq!(stored, metric, "{name}");
        }
    }
}

#[tokio::test]
async fn test_counter_overflow_rejected_across_backends() {
    let dir = tempfile::tempdir().unwrap();

    for (name, store) in all_backends(&dir).await {
        store.set(Metric::counter("big", i64::MAX)).await.unwrap();
        store.set(Metric::gauge("other", 1.0).unwrap()).await.unwrap();

        assert_matches!(
            store.set(Metric::counter("big", 1)).await,
            Err(StorageError::Metric(MetricError::InvalidValue { kind: MetricKind::Counter, .. })),
            "{}", name
        );

        // The stored total and every other key stay readable
        assert_eq!(
            store.get(MetricKind::Counter, "big").await.unwrap().delta(),
            Some(i64::MAX),
            "{name}"
        );
        assert_eq!(store.get_all().await.unwrap().len(), 2, "{name}");
        assert_eq!(store.value("gauge", "other").await.unwrap(), "1", "{name}");
    }
}
