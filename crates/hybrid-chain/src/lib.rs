//! # Hybrid Chain
//!
//! A tamper-evident, append-only hash chain with a sparse checkpoint index
//! for fast random access, and best-effort replication between peers.
//!
//! ## Overview
//!
//! - **Entry Store**: every entry's hash binds its predecessor's hash, its
//!   timestamp and its payload. Appends verify before linking.
//! - **Sparse Index**: every `interval`-th entry is snapshotted as a
//!   checkpoint, so a read walks at most `interval` entries.
//! - **Resolver**: reads that start from the nearest checkpoint and skip
//!   chain-wide verification.
//! - **Replication**: new entries are announced as `NEW_BLOCK`; a peer
//!   links one only if it extends its own tail.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hybrid_chain::{ChainConfig, LocalChain};
//! use serde_json::json;
//!
//! async fn example() -> hybrid_chain::Result<()> {
//!     let chain = LocalChain::local(ChainConfig::default())?;
//!
//!     for i in 0..7 {
//!         chain.submit(json!(format!("A{}", i))).await?;
//!     }
//!
//!     assert!(chain.validate());
//!     assert_eq!(chain.fetch(5).await?, Some(json!("A5")));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hybrid_chain::core` - entries, the chain, the sparse index, the resolver
//! - `hybrid_chain::store` - checkpoint storage (memory and SQLite)
//! - `hybrid_chain::sync` - wire messages, transports, replication

pub mod config;
pub mod error;
pub mod node;

pub use hybrid_chain_core as core;
pub use hybrid_chain_store as store;
pub use hybrid_chain_sync as sync;

pub use config::{IndexBacking, NodeConfig};
pub use error::{NodeError, Result};
pub use node::{HybridChain, LocalChain};

pub use hybrid_chain_core::{
    ChainConfig, ChainError, Checkpoint, Entry, EntryHash, EntrySnapshot, SharedChain,
    VerificationMode, WriteMode,
};
pub use hybrid_chain_store::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use hybrid_chain_sync::{
    Delivery, DropReason, MemoryNetwork, MemoryTransport, PeerId, ReplicationConfig,
    ReplicationState, TcpTransport, Transport,
};
