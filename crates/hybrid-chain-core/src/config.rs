//! Chain configuration.

use crate::chain::VerificationMode;

/// Checkpoint density used when none is given.
pub const DEFAULT_INTERVAL: u64 = 3;

/// Whether concurrent appends are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// An append holds the exclusive lock from reading the tail until the
    /// new entry is linked. Two appends can never observe the same tail.
    #[default]
    Serialized,

    /// An append reads the tail and verifies under a shared lock, releases
    /// it, and only takes the exclusive lock to link. Two appends that both
    /// read the tail before either links produce entries with the same
    /// `previous_hash`.
    Racy,
}

/// Configuration for a [`SharedChain`](crate::shared::SharedChain).
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// A checkpoint is recorded every `interval` entries. Must be positive.
    pub interval: u64,
    /// Pre-append and verified-read policy.
    pub verification: VerificationMode,
    /// Concurrency policy for appends.
    pub write_mode: WriteMode,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            verification: VerificationMode::Full,
            write_mode: WriteMode::Serialized,
        }
    }
}
