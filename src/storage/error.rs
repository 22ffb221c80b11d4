//! Error types for storage operations

use std::fmt;

use crate::metric::{MetricError, MetricKind};

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// No metric has ever been stored under this key
    NotFound { kind: MetricKind, id: String },

    /// The metric itself is malformed (bad kind, bad value, missing field)
    Metric(MetricError),

    /// The durable backend could not be reached; the only retryable class
    Connectivity(String),

    /// Every attempt of a retried operation failed with a connectivity error
    RetryExhausted {
        attempts: u32,
        last: Box<StorageError>,
    },

    /// Database query failed for a reason other than connectivity
    QueryFailed(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// Snapshot encoding/decoding error
    SerializationError(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),

    /// The backend is not healthy
    UnhealthyBackend(String),
}

impl StorageError {
    /// Whether the retry policy may attempt the failed operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Connectivity(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { kind, id } => write!(f, "{} metric {:?} not found", kind, id),
            StorageError::Metric(err) => write!(f, "{}", err),
            StorageError::Connectivity(msg) => {
                write!(f, "failed to reach storage backend: {}", msg)
            }
            StorageError::RetryExhausted { attempts, last } => {
                write!(f, "giving up after {} attempts: {}", attempts, last)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "snapshot serialization error: {}", msg),
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
            StorageError::UnhealthyBackend(msg) => write!(f, "storage backend unhealthy: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Metric(err) => Some(err),
            StorageError::RetryExhausted { last, .. } => Some(last.as_ref()),
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MetricError> for StorageError {
    fn from(err: MetricError) -> Self {
        StorageError::Metric(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// SQLite primary result codes that mean "the database is unreachable right
/// now" rather than "this statement is wrong"
#[cfg(feature = "storage-sqlite")]
const SQLITE_CONNECTIVITY_CODES: [i32; 5] = [
    5,  // SQLITE_BUSY
    6,  // SQLITE_LOCKED
    10, // SQLITE_IOERR
    14, // SQLITE_CANTOPEN
    15, // SQLITE_PROTOCOL
];

#[cfg(feature = "storage-sqlite")]
fn is_connectivity_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        // extended result codes carry the primary code in the low byte
        .map(|c| SQLITE_CONNECTIVITY_CODES.contains(&(c & 0xff)))
        .unwrap_or(false)
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::Connectivity(err.to_string()),
            sqlx::Error::Database(db_err) if is_connectivity_code(db_err.code().as_deref()) => {
                StorageError::Connectivity(err.to_string())
            }
            sqlx::Error::Configuration(_) => StorageError::InvalidConfig(err.to_string()),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
