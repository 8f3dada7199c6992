//! Error types for the sync module.

use thiserror::Error;

use hybrid_chain_core::ChainError;

use crate::messages::PeerId;

/// Errors that can occur during replication.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Incoming bytes are not a well-formed message.
    #[error("decode error: {0}")]
    Decode(String),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The peer's queue is full; the frame was dropped for that peer.
    #[error("queue full for peer: {0}")]
    QueueFull(PeerId),

    /// Peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The local append failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
