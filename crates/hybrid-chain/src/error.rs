//! Error types for the node.

use hybrid_chain_core::ChainError;
use hybrid_chain_store::StoreError;
use hybrid_chain_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Chain error: integrity failure, bad index, bad configuration.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Checkpoint storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Replication error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

impl NodeError {
    /// Whether this error reports a broken chain.
    pub fn is_integrity(&self) -> bool {
        matches!(self, NodeError::Chain(e) if e.is_integrity())
    }
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
