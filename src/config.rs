use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::storage::retry::RetryPolicy;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (optional - defaults to in-memory with snapshots)
    #[serde(default, alias = "db")]
    pub storage: StorageConfig,
}

/// Storage configuration consumed by the backend selector
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Durable backend address; in-memory storage is used when unset or
    /// unreachable
    #[serde(alias = "db_dsn")]
    pub database_dsn: Option<String>,

    /// Attempts per durable backend round trip
    #[serde(alias = "db_conn_retries")]
    pub connect_retries: u32,

    /// Delay between two attempts, in seconds
    #[serde(alias = "db_timeout")]
    pub retry_delay_secs: u64,

    /// Upper bound for the startup open + ping probe, in seconds
    pub connect_timeout_secs: u64,

    /// Snapshot file for the in-memory backend; snapshots are disabled when unset
    #[serde(alias = "store_file")]
    pub file_storage_path: Option<PathBuf>,

    /// Snapshot interval in seconds (0 is treated as 1)
    #[serde(alias = "store_interval")]
    pub store_interval_secs: u64,

    /// Replay the snapshot file into the in-memory backend on startup
    pub restore: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_dsn: None,
            connect_retries: 3,
            retry_delay_secs: 2,
            connect_timeout_secs: 5,
            file_storage_path: Some(PathBuf::from("/tmp/metrics_db.json")),
            store_interval_secs: 300,
            restore: true,
        }
    }
}

impl StorageConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.connect_retries, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs.max(1))
    }
}

/// Storage flags, each also readable from its environment variable
///
/// Every flag is optional: a value given here replaces the one from the
/// config file, anything left out keeps it. An empty `-d` or `-f` disables
/// the durable backend or the snapshot file respectively.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StorageArgs {
    /// Durable backend DSN (sqlite: URL or file path)
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Attempts per durable backend round trip
    #[arg(long = "rc", env = "DATABASE_CONN_RETRY")]
    pub connect_retries: Option<u32>,

    /// Delay between two attempts, in seconds
    #[arg(long = "to", env = "DATABASE_TIMEOUT")]
    pub retry_delay_secs: Option<u64>,

    /// Upper bound for connecting to the durable backend, in seconds
    #[arg(long, env = "DATABASE_CONNECT_TIMEOUT")]
    pub connect_timeout_secs: Option<u64>,

    /// Snapshot file for the in-memory backend
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    pub file_storage_path: Option<String>,

    /// Snapshot interval in seconds
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    pub store_interval_secs: Option<u64>,

    /// Restore the snapshot on startup (`-r` alone means true)
    #[arg(short = 'r', long, env = "RESTORE", num_args = 0..=1, default_missing_value = "true")]
    pub restore: Option<bool>,
}

impl StorageArgs {
    /// Lay these flags over `config`
    pub fn apply(self, config: &mut StorageConfig) {
        if let Some(dsn) = self.database_dsn {
            config.database_dsn = Some(dsn).filter(|d| !d.is_empty());
        }
        if let Some(path) = self.file_storage_path {
            config.file_storage_path = Some(path).filter(|p| !p.is_empty()).map(PathBuf::from);
        }
        if let Some(retries) = self.connect_retries {
            config.connect_retries = retries;
        }
        if let Some(delay) = self.retry_delay_secs {
            config.retry_delay_secs = delay;
        }
        if let Some(timeout) = self.connect_timeout_secs {
            config.connect_timeout_secs = timeout;
        }
        if let Some(interval) = self.store_interval_secs {
            config.store_interval_secs = interval;
        }
        if let Some(restore) = self.restore {
            config.restore = restore;
        }

        trace!("storage config after flags: {config:?}");
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
