//! In-memory implementation of the CheckpointStore trait.
//!
//! Same semantics as SQLite, nothing persisted. Can be switched offline to
//! exercise persistence failures.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::{CheckpointRecord, CheckpointStore};

/// In-memory checkpoint store. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: RwLock<BTreeMap<u64, CheckpointRecord>>,
    offline: AtomicBool,
}

impl MemoryCheckpointStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every operation fails with an I/O error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "checkpoint store offline",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, checkpoint_index: u64, record: &CheckpointRecord) -> Result<()> {
        self.check_online()?;
        self.records
            .write()
            .unwrap()
            .insert(checkpoint_index, record.clone());
        Ok(())
    }

    async fn get(&self, checkpoint_index: u64) -> Result<Option<CheckpointRecord>> {
        self.check_online()?;
        Ok(self.records.read().unwrap().get(&checkpoint_index).cloned())
    }

    async fn floor(&self, checkpoint_index: u64) -> Result<Option<(u64, CheckpointRecord)>> {
        self.check_online()?;
        let records = self.records.read().unwrap();
        Ok(records
            .range(..=checkpoint_index)
            .next_back()
            .map(|(k, r)| (*k, r.clone())))
    }

    async fn len(&self) -> Result<u64> {
        self.check_online()?;
        Ok(self.records.read().unwrap().len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.check_online()?;
        self.records.write().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_chain_core::EntryHash;

    fn record(n: u8) -> CheckpointRecord {
        CheckpointRecord {
            hash: EntryHash::from_bytes([n; 32]),
            previous_hash: EntryHash::EMPTY,
            timestamp: n as i64,
            serialized_payload: format!("\"A{}\"", n),
        }
    }

    #[tokio::test]
    async fn test_put_get_floor() {
        let store = MemoryCheckpointStore::new();
        store.put(0, &record(1)).await.unwrap();
        store.put(2, &record(3)).await.unwrap();

        assert_eq!(store.get(0).await.unwrap(), Some(record(1)));
        assert_eq!(store.get(1).await.unwrap(), None);
        assert_eq!(store.floor(1).await.unwrap(), Some((0, record(1))));
        assert_eq!(store.floor(9).await.unwrap(), Some((2, record(3))));
        assert_eq!(store.len().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.floor(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let store = MemoryCheckpointStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.put(0, &record(1)).await,
            Err(StoreError::Io(_))
        ));
        store.set_offline(false);
        store.put(0, &record(1)).await.unwrap();
    }
}
