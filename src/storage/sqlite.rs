//! SQLite durable backend
//!
//! This module provides a SQLite-based implementation of the `MetricStore` trait.
//!
//! ## Features
//!
//! - **Self-provisioning**: creates the database file and the `metrics` table
//!   on open if they are missing
//! - **Atomic merges**: every `set` is a single upsert inside its own
//!   transaction, so concurrent counter increments on the same key never
//!   lose an update
//! - **WAL mode**: readers keep working while a writer holds the lock
//! - **Retry**: every round trip goes through the configured [`RetryPolicy`]
//!
//! ## Schema
//!
//! One table keyed by `(id, kind)` with nullable `delta` (counters) and
//! `value` (gauges) columns.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::MetricStore;
use super::error::{StorageError, StorageResult};
use super::retry::RetryPolicy;
use crate::metric::{Metric, MetricError, MetricKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    id    TEXT    NOT NULL,
    kind  TEXT    NOT NULL,
    delta INTEGER,
    value REAL,
    PRIMARY KEY (id, kind),
    CHECK (delta IS NULL OR typeof(delta) = 'integer')
)
"#;

// Counters add to the stored delta, gauges replace the stored value. The
// column belonging to the other kind is always NULL, so one statement
// covers both. A sum past i64 would be promoted to REAL; the CHECK above
// aborts the statement instead.
const UPSERT: &str = r#"
INSERT INTO metrics (id, kind, delta, value)
VALUES (?, ?, ?, ?)
ON CONFLICT (id, kind) DO UPDATE SET
    delta = COALESCE(metrics.delta, 0) + excluded.delta,
    value = excluded.value
"#;

const MAX_CONNECTIONS: u32 = 5;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite durable backend
#[derive(Debug)]
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    retry: RetryPolicy,
    dsn: String,
}

impl SqliteBackend {
    /// Connect to the database at `dsn` and ensure the schema exists
    ///
    /// `dsn` is either a `sqlite:` URL or a plain file path. Other URL
    /// schemes and `key=value` connection strings are refused with
    /// [`StorageError::InvalidConfig`] before anything touches the disk.
    /// Both the connection and the schema creation go through `retry`.
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use metric_keeper::storage::{retry::RetryPolicy, sqlite::SqliteBackend};
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::open("sqlite://./metrics.db", RetryPolicy::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(retry))]
    pub async fn open(dsn: &str, retry: RetryPolicy) -> StorageResult<Self> {
        info!("opening SQLite backend at: {}", dsn);

        validate_dsn(dsn)?;

        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = retry
            .run("open", || {
                let options = options.clone();
                async move {
                    let pool = SqlitePoolOptions::new()
                        .max_connections(MAX_CONNECTIONS)
                        .acquire_timeout(ACQUIRE_TIMEOUT)
                        .connect_with(options)
                        .await?;
                    Ok(pool)
                }
            })
            .await?;

        debug!("ensuring metrics table exists");
        let pool_ref = &pool;
        retry
            .run("create schema", || async move {
                sqlx::query(SCHEMA).execute(pool_ref).await?;
                Ok(())
            })
            .await?;

        info!("SQLite backend ready");

        Ok(Self {
            pool,
            retry,
            dsn: dsn.to_string(),
        })
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    fn row_to_metric(
        id: String,
        kind: &str,
        delta: Option<i64>,
        value: Option<f64>,
    ) -> StorageResult<Metric> {
        let kind = kind.parse::<MetricKind>()?;
        Ok(Metric::from_parts(id, kind, delta, value)?)
    }
}

/// Refuse DSNs that name another database engine
fn validate_dsn(dsn: &str) -> StorageResult<()> {
    let dsn = dsn.trim();

    if dsn.is_empty() {
        return Err(StorageError::InvalidConfig("empty database DSN".to_string()));
    }

    if dsn.starts_with("sqlite:") {
        return Ok(());
    }

    if let Some((scheme, _)) = dsn.split_once("://") {
        return Err(StorageError::InvalidConfig(format!(
            "unsupported database scheme '{scheme}', expected sqlite: or a file path"
        )));
    }

    if dsn.split_whitespace().any(|part| part.contains('=')) {
        return Err(StorageError::InvalidConfig(
            "key=value connection strings are not supported, expected sqlite: or a file path"
                .to_string(),
        ));
    }

    Ok(())
}

/// Turn the counter CHECK violation into the same error the in-memory
/// backend reports on overflow
fn reject_overflow(err: sqlx::Error, metric: &Metric) -> StorageError {
    let overflowed = matches!(
        &err,
        sqlx::Error::Database(db_err)
            if matches!(db_err.kind(), sqlx::error::ErrorKind::CheckViolation)
    );

    match (overflowed, metric.delta()) {
        (true, Some(delta)) => StorageError::Metric(MetricError::InvalidValue {
            kind: MetricKind::Counter,
            raw: delta.to_string(),
        }),
        _ => err.into(),
    }
}

#[async_trait]
impl MetricStore for SqliteBackend {
    #[instrument(skip(self))]
    async fn get(&self, kind: MetricKind, id: &str) -> StorageResult<Metric> {
        let pool = &self.pool;

        let row: Option<(Option<i64>, Option<f64>)> = self
            .retry
            .run("get", || async move {
                let row = sqlx::query_as::<_, (Option<i64>, Option<f64>)>(
                    "SELECT delta, value FROM metrics WHERE id = ? AND kind = ?",
                )
                .bind(id)
                .bind(kind.as_str())
                .fetch_optional(pool)
                .await?;
                Ok(row)
            })
            .await?;

        match row {
            Some((delta, value)) => {
                Self::row_to_metric(id.to_string(), kind.as_str(), delta, value)
            }
            None => Err(StorageError::NotFound {
                kind,
                id: id.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> StorageResult<Vec<Metric>> {
        let pool = &self.pool;

        let rows: Vec<(String, String, Option<i64>, Option<f64>)> = self
            .retry
            .run("get_all", || async move {
                let rows = sqlx::query_as::<_, (String, String, Option<i64>, Option<f64>)>(
                    "SELECT id, kind, delta, value FROM metrics",
                )
                .fetch_all(pool)
                .await?;
                Ok(rows)
            })
            .await?;

        debug!("scanned {} metrics", rows.len());

        rows.into_iter()
            .map(|(id, kind, delta, value)| Self::row_to_metric(id, &kind, delta, value))
            .collect()
    }

    #[instrument(skip_all, fields(metric = %metric))]
    async fn set(&self, metric: Metric) -> StorageResult<()> {
        // Refuse a metric missing its value before touching the database
        metric.value_string()?;

        let pool = &self.pool;
        let metric = &metric;

        self.retry
            .run("set", || async move {
                // Dropping an uncommitted transaction rolls it back
                let mut tx = pool.begin().await?;

                sqlx::query(UPSERT)
                    .bind(metric.id())
                    .bind(metric.kind().as_str())
                    .bind(metric.delta())
                    .bind(metric.value())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| reject_overflow(e, metric))?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> StorageResult<()> {
        let pool = &self.pool;

        self.retry
            .run("ping", || async move {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let pool = &self.pool;

        let (rows,): (i64,) = self
            .retry
            .run("get_stats", || async move {
                let count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM metrics")
                    .fetch_one(pool)
                    .await?;
                Ok(count)
            })
            .await?;

        Ok(format!("SQLite: {} metrics in {}", rows, self.dsn))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
