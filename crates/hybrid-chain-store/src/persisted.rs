//! The sparse index, persisted through a [`CheckpointStore`].
//!
//! Checkpoints may be handed in out of order when appends run concurrently.
//! The index queues them and writes to the store strictly in slot order: a
//! write for slot `k` is never issued before slot `k - 1` has completed. A
//! failed write leaves its checkpoint queued, and the next write or
//! [`flush`](PersistedIndex::flush) retries it first.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use hybrid_chain_core::{
    checkpoint_slot, resolve_start_with, Checkpoint, CheckpointRef, Entry, EntryStore, StartPoint,
};

use crate::error::{Result, StoreError};
use crate::traits::{CheckpointRecord, CheckpointStore};

struct Cursor {
    /// Next slot to write to the store.
    next: u64,
    /// Checkpoints handed in but not yet written.
    pending: BTreeMap<u64, CheckpointRecord>,
}

/// A sparse index whose checkpoints live in an external store.
pub struct PersistedIndex<C: CheckpointStore> {
    store: Arc<C>,
    interval: u64,
    cursor: Mutex<Cursor>,
}

impl<C: CheckpointStore> PersistedIndex<C> {
    /// Attach to `store`, resuming after whatever it already holds.
    pub async fn open(store: Arc<C>, interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(StoreError::InvalidInterval(interval));
        }
        let next = store.len().await?;
        Ok(Self {
            store,
            interval,
            cursor: Mutex::new(Cursor {
                next,
                pending: BTreeMap::new(),
            }),
        })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// The slot the next store write will target.
    pub async fn expected_slot(&self) -> u64 {
        self.cursor.lock().await.next
    }

    /// Checkpoints queued but not yet in the store.
    pub async fn pending(&self) -> usize {
        self.cursor.lock().await.pending.len()
    }

    /// Observe an entry that just became the tail of a chain of `new_length`.
    ///
    /// Queues a checkpoint when one is due and returns its slot. It is
    /// durable once every earlier slot is; an `Err` means the store failed
    /// and the checkpoint is still queued.
    pub async fn observe(&self, entry: &Entry, new_length: u64) -> Result<Option<u64>> {
        let Some(slot) = checkpoint_slot(new_length, self.interval) else {
            return Ok(None);
        };
        let record = CheckpointRecord::from_entry(entry)?;
        self.enqueue(slot, record).await.map(|_| Some(slot))
    }

    /// Persist a checkpoint recorded by the in-memory index.
    pub async fn record(&self, checkpoint: &Checkpoint) -> Result<()> {
        let record = CheckpointRecord::from_checkpoint(checkpoint)?;
        self.enqueue(checkpoint.checkpoint_index, record).await
    }

    /// Retry every queued checkpoint that is next in line.
    pub async fn flush(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        self.drain(&mut cursor).await
    }

    async fn enqueue(&self, slot: u64, record: CheckpointRecord) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        if slot < cursor.next {
            tracing::warn!(expected = cursor.next, got = slot, "rejecting already persisted checkpoint");
            return Err(StoreError::OutOfOrder {
                expected: cursor.next,
                got: slot,
            });
        }
        cursor.pending.insert(slot, record);
        self.drain(&mut cursor).await
    }

    async fn drain(&self, cursor: &mut Cursor) -> Result<()> {
        while let Some(record) = cursor.pending.get(&cursor.next) {
            self.store.put(cursor.next, record).await?;
            tracing::debug!(slot = cursor.next, hash = %record.hash.short(), "persisted checkpoint");
            cursor.pending.remove(&cursor.next);
            cursor.next += 1;
        }
        if !cursor.pending.is_empty() {
            tracing::debug!(next = cursor.next, queued = cursor.pending.len(), "waiting for earlier checkpoint");
        }
        Ok(())
    }

    /// The nearest stored checkpoint at or before the slot a walk to
    /// `target` would start after, with its slot.
    async fn lookup(&self, target: u64) -> Result<Option<(u64, CheckpointRef)>> {
        let k = target / self.interval;
        if k == 0 {
            return Ok(None);
        }
        Ok(self
            .store
            .floor(k - 1)
            .await?
            .map(|(slot, record)| (slot, record.reference())))
    }

    /// Fetch the checkpoint a walk to `target` would start after.
    pub async fn reference_for(&self, target: u64) -> Result<Option<CheckpointRef>> {
        Ok(self.lookup(target).await?.map(|(_, reference)| reference))
    }

    /// Start point for `target` against `chain`, resolving the stored hash
    /// back to a live entry.
    pub async fn resolve_start<S: EntryStore + Sync>(&self, target: u64, chain: &S) -> Result<StartPoint> {
        let (slot, reference) = match self.lookup(target).await? {
            Some((slot, reference)) => (Some(slot), Some(reference)),
            None => (None, None),
        };
        let mut start = resolve_start_with(chain, target, self.interval, reference);
        if start.checkpoint.is_some() {
            start.checkpoint = slot;
        }
        Ok(start)
    }

    /// Drop every stored and queued checkpoint and start over at slot 0.
    pub async fn reset(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        self.store.clear().await?;
        cursor.pending.clear();
        cursor.next = 0;
        Ok(())
    }
}
