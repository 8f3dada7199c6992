//! Node configuration.

use hybrid_chain_core::ChainConfig;
use hybrid_chain_sync::ReplicationConfig;

/// Where `fetch` finds its checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBacking {
    /// The in-memory sparse index. Nothing is written to the checkpoint store.
    #[default]
    Memory,

    /// The external checkpoint store. Every due checkpoint is written, in
    /// append order, before the append returns.
    Persisted,
}

/// Configuration for a [`HybridChain`](crate::HybridChain) node.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Interval, verification mode, write mode.
    pub chain: ChainConfig,
    /// Checkpoint source for resolver reads.
    pub index: IndexBacking,
    /// Listener settings, used when the node builds its own TCP transport.
    pub replication: ReplicationConfig,
}
