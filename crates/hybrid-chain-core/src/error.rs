//! Error types for Hybrid Chain Core.

use std::fmt;

use thiserror::Error;

/// The first broken link found while walking the chain from head to tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// The entry's stored hash does not match its recomputed digest.
    HashMismatch { position: u64 },

    /// The entry's `previous_hash` is not its predecessor's hash.
    LinkMismatch { position: u64 },
}

impl IntegrityViolation {
    /// Position of the offending entry.
    pub fn position(&self) -> u64 {
        match self {
            IntegrityViolation::HashMismatch { position }
            | IntegrityViolation::LinkMismatch { position } => *position,
        }
    }
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::HashMismatch { position } => {
                write!(f, "hash mismatch at position {}", position)
            }
            IntegrityViolation::LinkMismatch { position } => {
                write!(f, "broken link at position {}", position)
            }
        }
    }
}

/// Errors returned by chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain integrity compromised: {0}")]
    Integrity(IntegrityViolation),

    #[error("index {index} out of range for chain of length {length}")]
    IndexOutOfRange { index: u64, length: u64 },

    #[error("checkpoint interval must be positive, got {0}")]
    InvalidInterval(u64),
}

impl ChainError {
    /// Whether this error reports a broken chain.
    pub fn is_integrity(&self) -> bool {
        matches!(self, ChainError::Integrity(_))
    }
}

impl From<IntegrityViolation> for ChainError {
    fn from(v: IntegrityViolation) -> Self {
        ChainError::Integrity(v)
    }
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
