//! The Entry Store: an ordered, append-only, hash-linked sequence.
//!
//! Entries live in a contiguous arena addressed by position; the successor of
//! position `p` is `p + 1`. Integrity is never cached: it is recomputed on
//! demand by [`HashChain::verify_chain_integrity`] and, depending on the
//! [`VerificationMode`], before every append and verified read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::entry::{Entry, EntrySnapshot};
use crate::error::{ChainError, IntegrityViolation, Result};
use crate::types::EntryHash;

/// How much of the chain is re-verified before an append or verified read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationMode {
    /// Walk and re-hash the entire chain every time. O(length) per call,
    /// so N appends cost O(N²) overall.
    #[default]
    Full,

    /// Check only the entry being extended or read, and its link to its
    /// predecessor. O(1) per call.
    Incremental,
}

/// Read access to an ordered entry sequence.
///
/// The Sparse Index and the Random-Access Resolver work against this trait,
/// whether or not replication is attached to the underlying chain.
pub trait EntryStore {
    /// Number of linked entries.
    fn len(&self) -> u64;

    /// The entry at `position`, without any verification.
    fn entry(&self, position: u64) -> Option<&Entry>;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the position of the entry with the given hash by linear scan.
    fn position_of(&self, hash: &EntryHash) -> Option<u64> {
        (0..self.len()).find(|&p| self.entry(p).map(|e| &e.hash) == Some(hash))
    }

    /// Walk successors starting at `from`.
    fn walk(&self, from: u64) -> Walk<'_, Self>
    where
        Self: Sized,
    {
        Walk {
            store: self,
            next: from,
        }
    }
}

/// Iterator following successor links through an [`EntryStore`].
pub struct Walk<'a, S: EntryStore> {
    store: &'a S,
    next: u64,
}

impl<'a, S: EntryStore> Iterator for Walk<'a, S> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.store.entry(self.next)?;
        self.next += 1;
        Some(entry)
    }
}

/// Why a peer's entry was not adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptRejection {
    /// The entry does not extend our tail (stale, or an intermediate entry is missing).
    StalePredecessor { tail: EntryHash, claimed: EntryHash },

    /// The claimed hash does not match the claimed fields.
    HashMismatch { claimed: EntryHash, computed: EntryHash },
}

/// The hash chain itself.
pub struct HashChain {
    entries: Vec<Entry>,
    mode: VerificationMode,
    clock: Arc<dyn Clock>,
    /// Running count of entries re-hashed by verification, for cost assertions.
    verified: AtomicU64,
}

impl HashChain {
    /// Create an empty chain stamped by the system clock.
    pub fn new(mode: VerificationMode) -> Self {
        Self::with_clock(mode, Arc::new(SystemClock))
    }

    /// Create an empty chain with an explicit clock.
    pub fn with_clock(mode: VerificationMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            mode,
            clock,
            verified: AtomicU64::new(0),
        }
    }

    /// The verification policy in force.
    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    /// All entries in order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// First entry.
    pub fn head(&self) -> Option<&Entry> {
        self.entries.first()
    }

    /// Last entry.
    pub fn tail(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Hash of the tail, or the genesis sentinel when empty.
    pub fn tail_hash(&self) -> EntryHash {
        self.tail().map(|e| e.hash).unwrap_or(EntryHash::EMPTY)
    }

    /// Total number of entries re-hashed by verification so far.
    pub fn entries_verified(&self) -> u64 {
        self.verified.load(Ordering::Relaxed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the next entry against the current tail without linking it.
    pub fn prepare(&self, payload: Value) -> Entry {
        Entry::new(
            self.entries.len() as u64,
            self.clock.now(),
            payload,
            self.tail_hash(),
        )
    }

    /// Run the pre-link verification required by the current mode.
    ///
    /// An empty chain has nothing to verify.
    pub fn check_before_link(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let result = match self.mode {
            VerificationMode::Full => self.verify(),
            VerificationMode::Incremental => self.check_position(self.entries.len() as u64 - 1),
        };
        if let Err(ref e) = result {
            tracing::warn!(length = self.entries.len(), "refusing append: {}", e);
        }
        result
    }

    /// Link a prepared entry as the new tail. No checks.
    pub fn link(&mut self, entry: Entry) -> &Entry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Verify-then-append.
    ///
    /// On an integrity failure the new entry is discarded and the chain is
    /// left unchanged.
    pub fn append(&mut self, payload: Value) -> Result<&Entry> {
        let entry = self.prepare(payload);
        self.check_before_link()?;
        let entry = self.link(entry);
        tracing::debug!(seq = entry.seq, hash = %entry.hash, "appended entry");
        Ok(entry)
    }

    /// Adopt an entry produced elsewhere if it extends our tail and its
    /// digest checks out. Only this single entry is verified.
    pub fn try_adopt(
        &mut self,
        snapshot: EntrySnapshot,
    ) -> std::result::Result<&Entry, AdoptRejection> {
        let tail = self.tail_hash();
        if snapshot.previous_hash != tail {
            return Err(AdoptRejection::StalePredecessor {
                tail,
                claimed: snapshot.previous_hash,
            });
        }
        let computed = snapshot.compute_hash();
        self.verified.fetch_add(1, Ordering::Relaxed);
        if computed != snapshot.hash {
            return Err(AdoptRejection::HashMismatch {
                claimed: snapshot.hash,
                computed,
            });
        }
        let seq = self.entries.len() as u64;
        Ok(self.link(snapshot.into_entry(seq)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    /// Verified read: bounds check, verification per mode, then a walk from head.
    pub fn get(&self, index: u64) -> Result<&Value> {
        self.check_bounds(index)?;
        let verified = match self.mode {
            VerificationMode::Full => self.verify(),
            VerificationMode::Incremental => self.check_position(index),
        };
        if let Err(ref e) = verified {
            tracing::warn!(index, "refusing read: {}", e);
        }
        verified?;
        self.walk(0)
            .nth(index as usize)
            .map(|e| &e.payload)
            .ok_or(ChainError::IndexOutOfRange {
                index,
                length: self.len(),
            })
    }

    /// Fail with `IndexOutOfRange` unless `0 <= index < len`.
    pub fn check_bounds(&self, index: u64) -> Result<()> {
        if index >= self.len() {
            return Err(ChainError::IndexOutOfRange {
                index,
                length: self.len(),
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Recompute every digest and link. An empty chain is valid.
    pub fn verify_chain_integrity(&self) -> bool {
        self.find_violation().is_none()
    }

    /// Walk head to tail and report the first broken entry, if any.
    pub fn find_violation(&self) -> Option<IntegrityViolation> {
        let mut previous = EntryHash::EMPTY;
        for (position, entry) in self.entries.iter().enumerate() {
            let position = position as u64;
            self.verified.fetch_add(1, Ordering::Relaxed);
            if !entry.verify_integrity() {
                return Some(IntegrityViolation::HashMismatch { position });
            }
            if entry.previous_hash != previous {
                return Some(IntegrityViolation::LinkMismatch { position });
            }
            previous = entry.hash;
        }
        None
    }

    /// [`find_violation`](Self::find_violation) as a `Result`.
    pub fn verify(&self) -> Result<()> {
        match self.find_violation() {
            Some(v) => Err(ChainError::Integrity(v)),
            None => Ok(()),
        }
    }

    /// Check one entry's digest and its link to its predecessor.
    pub fn check_position(&self, position: u64) -> Result<()> {
        self.check_bounds(position)?;
        let entry = &self.entries[position as usize];
        self.verified.fetch_add(1, Ordering::Relaxed);
        if !entry.verify_integrity() {
            return Err(IntegrityViolation::HashMismatch { position }.into());
        }
        let expected = match position {
            0 => EntryHash::EMPTY,
            p => self.entries[p as usize - 1].hash,
        };
        if entry.previous_hash != expected {
            return Err(IntegrityViolation::LinkMismatch { position }.into());
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Out-of-band tools
    // ─────────────────────────────────────────────────────────────────────────

    /// Overwrite the payload at `index` without recomputing its hash.
    ///
    /// Demo and test use only: it deliberately breaks the chain.
    pub fn tamper(&mut self, index: u64, payload: Value) -> Result<()> {
        self.check_bounds(index)?;
        self.entries[index as usize].payload = payload;
        tracing::info!(index, "tampered with entry payload");
        Ok(())
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        self.entries.clear();
        tracing::info!("chain reset");
    }
}

impl EntryStore for HashChain {
    fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    fn entry(&self, position: u64) -> Option<&Entry> {
        self.entries.get(position as usize)
    }
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new(VerificationMode::default())
    }
}

impl std::fmt::Debug for HashChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChain")
            .field("len", &self.entries.len())
            .field("mode", &self.mode)
            .field("tail", &self.tail_hash())
            .finish()
    }
}
