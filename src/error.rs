use std::io;

use thiserror::Error;
use tracing::error;

use crate::store::StoreKind;

/// Result alias used throughout the checker.
pub type Result<T> = std::result::Result<T, ConsistencyError>;

/// Hard failures of the checker.
///
/// Inconsistencies found in the store are never returned through this type;
/// they are handed to a [`crate::report::ConsistencyReporter`]. Everything
/// here means the check itself could not run as configured.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// I/O error while loading configuration or reading the store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The record store failed to produce a record.
    #[error("store read failed for {store:?} {id}: {message}")]
    Store {
        /// Store that was read.
        store: StoreKind,
        /// Requested record id.
        id: i64,
        /// Backend specific description.
        message: String,
    },
    /// A cache slot layout violates the codec constraints.
    #[error("invalid slot layout: {0}")]
    InvalidLayout(String),
    /// Invalid checker configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// A summary could not be serialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// A comparative checker received a record of the wrong kind.
    #[error("expected {expected:?} record, found {found:?}")]
    UnexpectedRecord {
        /// Store the checker asked for.
        expected: StoreKind,
        /// Store of the record it received.
        found: StoreKind,
    },
    /// A worker thread panicked.
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl ConsistencyError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        ConsistencyError::Config(message.into())
    }

    pub(crate) fn worker_panicked(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        error!(%message, "consistency.worker.panicked");
        ConsistencyError::WorkerPanicked(message)
    }
}
