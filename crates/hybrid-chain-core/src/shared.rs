//! A chain and its sparse index behind one lock.
//!
//! Reads (`fetch`, `get_verified`, `validate`) share the lock; appends take
//! it exclusively to link. How long an append holds the lock depends on the
//! [`WriteMode`]:
//!
//! ```text
//! Serialized:  [write: read tail, verify, build, link]
//! Racy:        [read: read tail, verify, build] ... [write: link]
//! ```
//!
//! In racy mode the gap between the two critical sections is observable:
//! two appends that both finish `begin_append` before either commits link
//! two entries carrying the same `previous_hash`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use serde_json::Value;

use crate::chain::{AdoptRejection, EntryStore, HashChain};
use crate::clock::{Clock, SystemClock};
use crate::config::{ChainConfig, WriteMode};
use crate::entry::{Entry, EntrySnapshot};
use crate::error::{IntegrityViolation, Result};
use crate::index::{resolve_start_with, Checkpoint, CheckpointRef, SparseIndex, StartPoint};
use crate::resolver::{walk_to, Resolver};

/// The chain plus the index fed by its appends.
#[derive(Debug)]
pub struct ChainState {
    chain: HashChain,
    index: SparseIndex,
}

impl ChainState {
    pub fn chain(&self) -> &HashChain {
        &self.chain
    }

    pub fn index(&self) -> &SparseIndex {
        &self.index
    }

    /// Link `entry` and let the index observe it.
    fn link(&mut self, entry: Entry) -> Appended {
        let entry = self.chain.link(entry).clone();
        self.observe(entry)
    }

    fn observe(&mut self, entry: Entry) -> Appended {
        let length = self.chain.len();
        let checkpoint = self.index.on_append(&entry, length).cloned();
        Appended {
            entry,
            position: length - 1,
            checkpoint,
        }
    }
}

/// A linked entry and the checkpoint it produced, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub entry: Entry,
    /// Where the entry was linked. Differs from `entry.seq` only when a
    /// racy append lost the race.
    pub position: u64,
    pub checkpoint: Option<Checkpoint>,
}

/// An owned lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub value: Value,
    pub start: StartPoint,
    pub steps: u64,
}

/// An append that has been built and verified but not linked yet.
///
/// Dropping it without calling [`commit`](Self::commit) discards the entry.
#[must_use = "a pending append does nothing until committed"]
pub struct PendingAppend<'a> {
    shared: &'a SharedChain,
    entry: Entry,
    /// Held from `begin_append` to `commit` in serialized mode.
    guard: Option<RwLockWriteGuard<'a, ChainState>>,
}

impl<'a> PendingAppend<'a> {
    /// The entry about to be linked.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Link the entry as the new tail.
    ///
    /// The entry is linked exactly as built. In racy mode it may no longer
    /// extend the tail; that damage is left for verification to find.
    pub fn commit(self) -> Appended {
        let PendingAppend {
            shared,
            entry,
            guard,
        } = self;
        let mut state = match guard {
            Some(guard) => guard,
            None => shared.state.write().unwrap(),
        };
        let appended = state.link(entry);
        tracing::debug!(
            seq = appended.entry.seq,
            hash = %appended.entry.hash.short(),
            "appended entry"
        );
        appended
    }
}

/// A hash chain shared between readers and writers.
pub struct SharedChain {
    state: RwLock<ChainState>,
    write_mode: WriteMode,
}

impl SharedChain {
    /// Create an empty chain stamped by the system clock.
    pub fn new(config: ChainConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty chain with an explicit clock.
    pub fn with_clock(config: ChainConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let index = SparseIndex::new(config.interval)?;
        Ok(Self {
            state: RwLock::new(ChainState {
                chain: HashChain::with_clock(config.verification, clock),
                index,
            }),
            write_mode: config.write_mode,
        })
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn interval(&self) -> u64 {
        self.read().index.interval()
    }

    /// Shared access to the chain and index.
    pub fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify-then-append in one call.
    pub fn append(&self, payload: Value) -> Result<Appended> {
        Ok(self.begin_append(payload)?.commit())
    }

    /// Read the tail, verify, and build the next entry.
    ///
    /// In serialized mode this blocks while another append is pending.
    pub fn begin_append(&self, payload: Value) -> Result<PendingAppend<'_>> {
        match self.write_mode {
            WriteMode::Serialized => {
                let guard = self.state.write().unwrap();
                self.build(guard, payload)
            }
            WriteMode::Racy => {
                let entry = {
                    let state = self.read();
                    let entry = state.chain.prepare(payload);
                    state.chain.check_before_link()?;
                    entry
                };
                Ok(PendingAppend {
                    shared: self,
                    entry,
                    guard: None,
                })
            }
        }
    }

    /// Like [`begin_append`](Self::begin_append), but returns `Ok(None)`
    /// instead of blocking when the lock is taken.
    pub fn try_begin_append(&self, payload: Value) -> Result<Option<PendingAppend<'_>>> {
        match self.write_mode {
            WriteMode::Serialized => match self.state.try_write() {
                Ok(guard) => self.build(guard, payload).map(Some),
                Err(TryLockError::WouldBlock) => Ok(None),
                Err(TryLockError::Poisoned(e)) => panic!("chain lock poisoned: {}", e),
            },
            WriteMode::Racy => match self.state.try_read() {
                Ok(state) => {
                    let entry = state.chain.prepare(payload);
                    state.chain.check_before_link()?;
                    drop(state);
                    Ok(Some(PendingAppend {
                        shared: self,
                        entry,
                        guard: None,
                    }))
                }
                Err(TryLockError::WouldBlock) => Ok(None),
                Err(TryLockError::Poisoned(e)) => panic!("chain lock poisoned: {}", e),
            },
        }
    }

    fn build<'a>(
        &'a self,
        guard: RwLockWriteGuard<'a, ChainState>,
        payload: Value,
    ) -> Result<PendingAppend<'a>> {
        let entry = guard.chain.prepare(payload);
        guard.chain.check_before_link()?;
        Ok(PendingAppend {
            shared: self,
            entry,
            guard: Some(guard),
        })
    }

    /// Link a peer's entry if it extends the tail and its digest checks out.
    pub fn try_adopt(
        &self,
        snapshot: EntrySnapshot,
    ) -> std::result::Result<Appended, AdoptRejection> {
        let mut state = self.state.write().unwrap();
        let entry = state.chain.try_adopt(snapshot)?.clone();
        Ok(state.observe(entry))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolver read. No chain-wide verification.
    pub fn fetch(&self, index: u64) -> Result<Value> {
        self.locate(index).map(|f| f.value)
    }

    /// Resolver read through the in-memory index, reporting the walk taken.
    pub fn locate(&self, index: u64) -> Result<Fetched> {
        let state = self.read();
        let lookup = Resolver::new(&state.chain, &state.index).locate(index)?;
        Ok(Fetched {
            value: lookup.entry.payload.clone(),
            start: lookup.start,
            steps: lookup.steps,
        })
    }

    /// Resolver read using a checkpoint obtained elsewhere (for example from
    /// a persisted store) instead of the in-memory index.
    pub fn locate_with(&self, index: u64, checkpoint: Option<CheckpointRef>) -> Result<Fetched> {
        let state = self.read();
        state.chain.check_bounds(index)?;
        let start = resolve_start_with(&state.chain, index, state.index.interval(), checkpoint);
        let lookup = walk_to(&state.chain, start, index)?;
        Ok(Fetched {
            value: lookup.entry.payload.clone(),
            start: lookup.start,
            steps: lookup.steps,
        })
    }

    /// Entry Store read: verification per the chain's mode, walk from head.
    pub fn get_verified(&self, index: u64) -> Result<Value> {
        self.read().chain.get(index).cloned()
    }

    /// Re-verify the whole chain.
    pub fn validate(&self) -> bool {
        let state = self.read();
        match state.chain.find_violation() {
            Some(violation) => {
                tracing::warn!(len = state.chain.len(), "validation failed: {}", violation);
                false
            }
            None => true,
        }
    }

    pub fn find_violation(&self) -> Option<IntegrityViolation> {
        self.read().chain.find_violation()
    }

    pub fn len(&self) -> u64 {
        self.read().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry, head first.
    pub fn entries(&self) -> Vec<Entry> {
        self.read().chain.entries().to_vec()
    }

    pub fn tail(&self) -> Option<Entry> {
        self.read().chain.tail().cloned()
    }

    /// Snapshot of every in-memory checkpoint.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.read().index.checkpoints().cloned().collect()
    }

    pub fn entries_verified(&self) -> u64 {
        self.read().chain.entries_verified()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Out-of-band tools
    // ─────────────────────────────────────────────────────────────────────────

    /// Overwrite a payload without rehashing. Demo and test use only.
    pub fn tamper(&self, index: u64, payload: Value) -> Result<()> {
        self.state.write().unwrap().chain.tamper(index, payload)
    }

    /// Drop every entry and every in-memory checkpoint.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap();
        state.chain.reset();
        state.index.clear();
    }
}

impl std::fmt::Debug for SharedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChain")
            .field("write_mode", &self.write_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::VerificationMode;
    use crate::clock::LogicalClock;
    use crate::error::ChainError;
    use serde_json::json;
    use std::sync::Barrier;
    use std::thread;

    fn shared(interval: u64, write_mode: WriteMode) -> SharedChain {
        let config = ChainConfig {
            interval,
            write_mode,
            ..Default::default()
        };
        SharedChain::with_clock(config, Arc::new(LogicalClock::default())).unwrap()
    }

    #[test]
    fn test_append_feeds_index() {
        let chain = shared(3, WriteMode::Serialized);
        let mut recorded = Vec::new();
        for i in 0..7 {
            let appended = chain.append(json!(format!("A{}", i))).unwrap();
            if let Some(cp) = appended.checkpoint {
                recorded.push((appended.position + 1, cp.position));
            }
        }
        assert_eq!(recorded, vec![(3, 2), (6, 5)]);

        let fetched = chain.locate(5).unwrap();
        assert_eq!(fetched.value, json!("A5"));
        assert_eq!(fetched.start.index, 3);
        assert_eq!(fetched.steps, 2);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = ChainConfig {
            interval: 0,
            ..Default::default()
        };
        assert!(matches!(
            SharedChain::new(config),
            Err(ChainError::InvalidInterval(0))
        ));
    }

    #[test]
    fn test_serialized_blocks_second_begin() {
        let chain = shared(3, WriteMode::Serialized);
        chain.append(json!("A0")).unwrap();

        let first = chain.begin_append(json!("A1")).unwrap();
        assert!(chain.try_begin_append(json!("B1")).unwrap().is_none());
        first.commit();

        let second = chain.try_begin_append(json!("B1")).unwrap().unwrap();
        second.commit();

        let entries = chain.entries();
        assert_eq!(entries[2].previous_hash, entries[1].hash);
        assert!(chain.validate());
    }

    #[test]
    fn test_racy_forced_interleaving_shares_predecessor() {
        let chain = shared(3, WriteMode::Racy);
        chain.append(json!("A0")).unwrap();
        let h0 = chain.tail().unwrap().hash;

        let first = chain.begin_append(json!("A1")).unwrap();
        let second = chain.try_begin_append(json!("B1")).unwrap().unwrap();
        first.commit();
        let late = second.commit();
        assert_eq!(late.entry.seq, 1);
        assert_eq!(late.position, 2);

        let entries = chain.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].previous_hash, h0);
        assert_eq!(entries[2].previous_hash, h0);
        assert_eq!(
            chain.find_violation(),
            Some(IntegrityViolation::LinkMismatch { position: 2 })
        );
    }

    #[test]
    fn test_racy_threads_both_pass_verification() {
        let chain = Arc::new(shared(3, WriteMode::Racy));
        chain.append(json!("A0")).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|name| {
                let chain = Arc::clone(&chain);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let pending = chain.begin_append(json!(name)).unwrap();
                    // Both have read the tail before either links.
                    barrier.wait();
                    pending.commit()
                })
            })
            .collect();
        let linked: Vec<Appended> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(linked[0].entry.previous_hash, linked[1].entry.previous_hash);
        assert!(!chain.validate());
    }

    #[test]
    fn test_serialized_threads_never_share_predecessor() {
        let chain = Arc::new(shared(3, WriteMode::Serialized));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let chain = Arc::clone(&chain);
                thread::spawn(move || {
                    for i in 0..10 {
                        chain.append(json!({ "thread": t, "i": i })).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = chain.entries();
        assert_eq!(entries.len(), 80);
        let mut predecessors: Vec<_> = entries.iter().map(|e| e.previous_hash).collect();
        predecessors.sort();
        predecessors.dedup();
        assert_eq!(predecessors.len(), 80);
        assert!(chain.validate());
    }

    #[test]
    fn test_dropped_pending_append_is_discarded() {
        let chain = shared(3, WriteMode::Serialized);
        drop(chain.begin_append(json!("never")).unwrap());
        assert!(chain.is_empty());
        chain.append(json!("A0")).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_tamper_visibility_by_path() {
        let chain = shared(3, WriteMode::Serialized);
        for i in 0..9 {
            chain.append(json!(format!("A{}", i))).unwrap();
        }
        chain.tamper(4, json!("forged")).unwrap();

        assert!(!chain.validate());
        assert!(chain.get_verified(6).unwrap_err().is_integrity());
        // The resolver does not verify, so earlier positions still read.
        assert_eq!(chain.fetch(2).unwrap(), json!("A2"));
        // And later ones read whatever is stored.
        assert_eq!(chain.fetch(4).unwrap(), json!("forged"));
    }

    #[test]
    fn test_append_refused_after_tamper() {
        let chain = shared(3, WriteMode::Racy);
        chain.append(json!("A0")).unwrap();
        chain.append(json!("A1")).unwrap();
        chain.tamper(0, json!("forged")).unwrap();
        assert!(chain.append(json!("A2")).unwrap_err().is_integrity());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_adopt_feeds_index() {
        let source = shared(2, WriteMode::Serialized);
        let replica = shared(2, WriteMode::Serialized);
        for i in 0..4 {
            let appended = source.append(json!(i)).unwrap();
            let adopted = replica.try_adopt(appended.entry.snapshot()).unwrap();
            assert_eq!(adopted.checkpoint.is_some(), appended.checkpoint.is_some());
        }
        assert_eq!(replica.entries(), source.entries());
        assert_eq!(replica.checkpoints().len(), 2);
    }

    #[test]
    fn test_locate_with_external_checkpoint() {
        let chain = shared(3, WriteMode::Serialized);
        for i in 0..7 {
            chain.append(json!(format!("A{}", i))).unwrap();
        }
        let cp = chain.checkpoints()[0].clone();
        let reference = CheckpointRef {
            hash: cp.referenced_hash,
            position: None,
        };
        let fetched = chain.locate_with(5, Some(reference)).unwrap();
        assert_eq!(fetched.start.index, 3);
        assert_eq!(fetched.value, json!("A5"));

        let missing = chain.locate_with(5, None).unwrap();
        assert_eq!(missing.start, StartPoint::HEAD);
        assert_eq!(missing.steps, 5);
    }

    #[test]
    fn test_reset_clears_index() {
        let chain = shared(1, WriteMode::Serialized);
        chain.append(json!(1)).unwrap();
        chain.append(json!(2)).unwrap();
        chain.reset();
        assert!(chain.is_empty());
        assert!(chain.checkpoints().is_empty());
        assert!(matches!(
            chain.fetch(0),
            Err(ChainError::IndexOutOfRange { index: 0, length: 0 })
        ));
    }

    #[test]
    fn test_incremental_mode_cost() {
        let config = ChainConfig {
            verification: VerificationMode::Incremental,
            ..Default::default()
        };
        let chain = SharedChain::with_clock(config, Arc::new(LogicalClock::default())).unwrap();
        for i in 0..50 {
            chain.append(json!(i)).unwrap();
        }
        assert_eq!(chain.entries_verified(), 49);
    }
}
