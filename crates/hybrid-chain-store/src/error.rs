//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during checkpoint store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A checkpoint arrived for a slot that is already persisted.
    #[error("out-of-order checkpoint write: expected slot {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// Checkpoint interval must be positive.
    #[error("invalid checkpoint interval: {0}")]
    InvalidInterval(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
