//! # Hybrid Chain Store
//!
//! Checkpoint persistence for the sparse index. The index treats storage as
//! a capability behind the [`CheckpointStore`] trait, with [`SqliteCheckpointStore`]
//! for durable storage and [`MemoryCheckpointStore`] for tests.
//!
//! ## Key Types
//!
//! - [`CheckpointStore`] - Async put/get by checkpoint slot
//! - [`CheckpointRecord`] - `{hash, previous_hash, timestamp, serialized_payload}`
//! - [`PersistedIndex`] - Sparse index over a store, enforcing in-order writes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hybrid_chain_store::{PersistedIndex, SqliteCheckpointStore};
//!
//! async fn example() {
//!     let store = Arc::new(SqliteCheckpointStore::open("checkpoints.db").unwrap());
//!     let index = PersistedIndex::open(store, 3).await.unwrap();
//!
//!     // After each append:
//!     // index.observe(&entry, chain.len()).await?;
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Weak references**: records name their entry by hash, never by position,
//!   so they stay meaningful if the chain is reloaded.
//! - **Ordered writes**: one write in flight per index, slots strictly increasing.
//! - **No retry**: persistence failures are returned to the caller.

pub mod error;
pub mod memory;
pub mod migration;
pub mod persisted;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryCheckpointStore;
pub use persisted::PersistedIndex;
pub use sqlite::SqliteCheckpointStore;
pub use traits::{CheckpointRecord, CheckpointStore};
