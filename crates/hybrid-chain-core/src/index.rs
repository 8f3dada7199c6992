//! Sparse Index: a checkpoint every `interval` entries.
//!
//! After the chain reaches length `n` with `n % interval == 0`, the entry at
//! position `n - 1` is recorded as checkpoint `n / interval - 1`. Slot
//! `k - 1` therefore covers positions up to `k * interval - 1`, and its
//! successor is the first entry of block `k`.
//!
//! Checkpoints refer to entries by hash. The recorded position is only a
//! hint: it is trusted when the entry there still carries the referenced
//! hash, otherwise the hash is looked up by scan, and if no entry has it the
//! walk starts from the head.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain::EntryStore;
use crate::entry::{Entry, EntrySnapshot};
use crate::error::{ChainError, Result};
use crate::types::EntryHash;

/// The checkpoint slot due after the chain grows to `new_length`, if any.
pub fn checkpoint_slot(new_length: u64, interval: u64) -> Option<u64> {
    if interval == 0 || new_length == 0 || new_length % interval != 0 {
        return None;
    }
    Some(new_length / interval - 1)
}

/// A recorded reference into the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_index: u64,
    pub referenced_hash: EntryHash,
    /// Position of the referenced entry when the checkpoint was taken.
    pub position: u64,
    pub snapshot: EntrySnapshot,
}

impl Checkpoint {
    /// Record `entry`, sitting at `position`, as checkpoint `checkpoint_index`.
    pub fn new(checkpoint_index: u64, position: u64, entry: &Entry) -> Self {
        Self {
            checkpoint_index,
            referenced_hash: entry.hash,
            position,
            snapshot: entry.snapshot(),
        }
    }

    /// The lookup key for this checkpoint.
    pub fn reference(&self) -> CheckpointRef {
        CheckpointRef {
            hash: self.referenced_hash,
            position: Some(self.position),
        }
    }
}

/// What a resolver needs to find a checkpointed entry again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointRef {
    pub hash: EntryHash,
    pub position: Option<u64>,
}

impl CheckpointRef {
    /// Resolve to a live position in `store`.
    pub fn locate<S: EntryStore>(&self, store: &S) -> Option<u64> {
        if let Some(p) = self.position {
            if store.entry(p).map(|e| e.hash) == Some(self.hash) {
                return Some(p);
            }
        }
        store.position_of(&self.hash)
    }
}

/// Where a forward walk should begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPoint {
    /// Position of the first entry to visit.
    pub index: u64,
    /// The checkpoint slot used, or `None` when starting from the head.
    pub checkpoint: Option<u64>,
}

impl StartPoint {
    /// Start at the head of the chain.
    pub const HEAD: Self = Self {
        index: 0,
        checkpoint: None,
    };

    /// The entry this start point refers to.
    pub fn entry<'a, S: EntryStore>(&self, store: &'a S) -> Option<&'a Entry> {
        store.entry(self.index)
    }
}

/// Compute the start point for `target` given the checkpoint in slot
/// `target / interval - 1` (if that slot is needed and known).
///
/// An interval of zero has no checkpoints, so every walk starts at the head.
pub fn resolve_start_with<S: EntryStore>(
    store: &S,
    target: u64,
    interval: u64,
    checkpoint: Option<CheckpointRef>,
) -> StartPoint {
    if interval == 0 {
        return StartPoint::HEAD;
    }
    let k = target / interval;
    if k == 0 {
        return StartPoint::HEAD;
    }
    let Some(reference) = checkpoint else {
        return StartPoint::HEAD;
    };
    match reference.locate(store) {
        // The successor of the checkpointed entry opens block k.
        Some(p) if p < target => StartPoint {
            index: p + 1,
            checkpoint: Some(k - 1),
        },
        _ => {
            tracing::debug!(target, slot = k - 1, "checkpoint does not resolve, walking from head");
            StartPoint::HEAD
        }
    }
}

/// In-memory sparse index.
#[derive(Debug, Clone)]
pub struct SparseIndex {
    interval: u64,
    checkpoints: BTreeMap<u64, Checkpoint>,
}

impl SparseIndex {
    /// Create an index recording every `interval`-th entry.
    ///
    /// `interval = 1` indexes everything; an interval at least the chain's
    /// length indexes nothing useful.
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(ChainError::InvalidInterval(interval));
        }
        Ok(Self {
            interval,
            checkpoints: BTreeMap::new(),
        })
    }

    /// The checkpoint density.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Observe an entry that just became the tail of a chain of `new_length`.
    ///
    /// Returns the checkpoint if one was recorded.
    pub fn on_append(&mut self, entry: &Entry, new_length: u64) -> Option<&Checkpoint> {
        let slot = checkpoint_slot(new_length, self.interval)?;
        let checkpoint = Checkpoint::new(slot, new_length - 1, entry);
        tracing::debug!(slot, hash = %entry.hash, "recorded checkpoint");
        self.checkpoints.insert(slot, checkpoint);
        self.checkpoints.get(&slot)
    }

    /// Nearest useful start for a walk to `target`.
    ///
    /// Always `index <= target`; while the index and the store agree,
    /// `target - index < interval`.
    pub fn resolve_start<S: EntryStore>(&self, target: u64, store: &S) -> StartPoint {
        let k = target / self.interval;
        let reference = k
            .checked_sub(1)
            .and_then(|slot| self.checkpoints.get(&slot))
            .map(Checkpoint::reference);
        resolve_start_with(store, target, self.interval, reference)
    }

    /// The checkpoint in slot `k`.
    pub fn checkpoint(&self, k: u64) -> Option<&Checkpoint> {
        self.checkpoints.get(&k)
    }

    /// All checkpoints in slot order.
    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.values()
    }

    /// Number of recorded checkpoints.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether no checkpoint has been recorded.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Forget every checkpoint.
    pub fn clear(&mut self) {
        self.checkpoints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{HashChain, VerificationMode};
    use crate::clock::LogicalClock;
    use serde_json::json;
    use std::sync::Arc;

    fn indexed(interval: u64, n: usize) -> (HashChain, SparseIndex) {
        let mut chain =
            HashChain::with_clock(VerificationMode::Full, Arc::new(LogicalClock::default()));
        let mut index = SparseIndex::new(interval).unwrap();
        for i in 0..n {
            let entry = chain.append(json!(format!("A{}", i))).unwrap().clone();
            index.on_append(&entry, chain.len());
        }
        (chain, index)
    }

    #[test]
    fn test_checkpoint_slot() {
        assert_eq!(checkpoint_slot(3, 3), Some(0));
        assert_eq!(checkpoint_slot(6, 3), Some(1));
        assert_eq!(checkpoint_slot(7, 3), None);
        assert_eq!(checkpoint_slot(0, 3), None);
        assert_eq!(checkpoint_slot(5, 1), Some(4));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            SparseIndex::new(0),
            Err(ChainError::InvalidInterval(0))
        ));
    }

    #[test]
    fn test_checkpoints_after_lengths_three_and_six() {
        let (chain, index) = indexed(3, 7);

        assert_eq!(index.len(), 2);
        let first = index.checkpoint(0).unwrap();
        let second = index.checkpoint(1).unwrap();
        assert_eq!(first.position, 2);
        assert_eq!(first.referenced_hash, chain.entries()[2].hash);
        assert_eq!(second.position, 5);
        assert_eq!(second.snapshot.value, json!("A5"));
    }

    #[test]
    fn test_resolve_start_uses_successor() {
        let (chain, index) = indexed(3, 7);

        let start = index.resolve_start(5, &chain);
        assert_eq!(start.index, 3);
        assert_eq!(start.checkpoint, Some(0));
        assert_eq!(start.entry(&chain).unwrap().payload, json!("A3"));

        assert_eq!(index.resolve_start(6, &chain).index, 6);
        assert_eq!(index.resolve_start(2, &chain), StartPoint::HEAD);
    }

    #[test]
    fn test_resolve_start_bounds() {
        for interval in 1..=8 {
            let (chain, index) = indexed(interval, 25);
            for target in 0..25 {
                let start = index.resolve_start(target, &chain);
                assert!(start.index <= target);
                assert!(target - start.index < interval);
            }
        }
    }

    #[test]
    fn test_zero_interval_walks_from_head() {
        let (chain, index) = indexed(3, 7);
        let reference = index.checkpoint(0).map(|c| c.reference());
        assert_eq!(resolve_start_with(&chain, 5, 0, reference), StartPoint::HEAD);
    }

    #[test]
    fn test_stale_hint_falls_back_to_scan() {
        let (chain, index) = indexed(2, 6);
        let mut reference = index.checkpoint(1).unwrap().reference();
        reference.position = Some(0);
        assert_eq!(reference.locate(&chain), Some(3));
    }

    #[test]
    fn test_reset_store_falls_back_to_head() {
        let (_, index) = indexed(3, 7);
        let mut other_chain =
            HashChain::with_clock(VerificationMode::Full, Arc::new(LogicalClock::starting_at(500)));
        for i in 0..7 {
            other_chain.append(json!(format!("B{}", i))).unwrap();
        }
        assert_eq!(index.resolve_start(5, &other_chain), StartPoint::HEAD);
    }

    #[test]
    fn test_clear() {
        let (_, mut index) = indexed(1, 4);
        assert_eq!(index.len(), 4);
        index.clear();
        assert!(index.is_empty());
    }
}
