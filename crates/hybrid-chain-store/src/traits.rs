//! CheckpointStore trait: the capability the sparse index persists through.
//!
//! The index only ever writes checkpoints keyed by slot and reads them
//! back by slot. Implementations include SQLite (durable) and in-memory
//! (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hybrid_chain_core::{Checkpoint, CheckpointRef, Entry, EntryHash, EntrySnapshot};

use crate::error::{Result, StoreError};

/// What the store keeps for one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Hash of the referenced entry.
    pub hash: EntryHash,
    pub previous_hash: EntryHash,
    pub timestamp: i64,
    /// The entry's payload as JSON text.
    pub serialized_payload: String,
}

impl CheckpointRecord {
    /// Build the record for `entry`.
    pub fn from_entry(entry: &Entry) -> Result<Self> {
        Self::from_snapshot(&entry.snapshot())
    }

    /// Build the record for an entry snapshot.
    pub fn from_snapshot(snapshot: &EntrySnapshot) -> Result<Self> {
        let serialized_payload = serde_json::to_string(&snapshot.value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            hash: snapshot.hash,
            previous_hash: snapshot.previous_hash,
            timestamp: snapshot.timestamp,
            serialized_payload,
        })
    }

    /// Build the record for an in-memory checkpoint.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Result<Self> {
        Self::from_snapshot(&checkpoint.snapshot)
    }

    /// Parse the record back into a snapshot.
    pub fn to_snapshot(&self) -> Result<EntrySnapshot> {
        let value = serde_json::from_str(&self.serialized_payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(EntrySnapshot {
            value,
            hash: self.hash,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
        })
    }

    /// Lookup key for the referenced entry. Stored records carry no
    /// position, so the entry is found by hash.
    pub fn reference(&self) -> CheckpointRef {
        CheckpointRef {
            hash: self.hash,
            position: None,
        }
    }
}

/// Async interface for checkpoint persistence.
///
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime. Writes are visible to reads once the returned future resolves.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store `record` at `checkpoint_index`, replacing any previous record.
    async fn put(&self, checkpoint_index: u64, record: &CheckpointRecord) -> Result<()>;

    /// The record at `checkpoint_index`.
    async fn get(&self, checkpoint_index: u64) -> Result<Option<CheckpointRecord>>;

    /// The record with the highest index `<= checkpoint_index`.
    async fn floor(&self, checkpoint_index: u64) -> Result<Option<(u64, CheckpointRecord)>>;

    /// Number of stored records.
    async fn len(&self) -> Result<u64>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;
}
