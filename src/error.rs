//! Error types shared by the library modules.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Duration is not one of the offered presets
    #[error("unsupported session duration {secs}s (expected one of 30, 45, 60, 120)")]
    UnsupportedDuration { secs: u32 },

    #[error("failed to write configuration file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Result store errors
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to create results directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored timestamp is not valid RFC 3339: {0}")]
    Timestamp(String),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("results store is unavailable: {0}")]
    Unavailable(String),
}

/// Webhook notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Network(String),

    #[error("webhook rejected the result with status {0}")]
    Status(u16),

    #[error("webhook client could not be initialised")]
    ClientUnavailable,
}

/// Result type alias for typepace operations
pub type Result<T> = std::result::Result<T, Error>;
