//! Random-Access Resolver: `get(index)` through the sparse index.
//!
//! A lookup jumps to the nearest checkpoint successor at or before the
//! target and walks forward from there. Expected walk length for a uniform
//! target is about `interval / 2`; the worst case is `interval - 1`.
//!
//! The resolver does not re-verify the chain. Callers that want that call
//! [`HashChain::verify_chain_integrity`](crate::chain::HashChain::verify_chain_integrity)
//! explicitly.

use serde_json::Value;

use crate::chain::EntryStore;
use crate::entry::Entry;
use crate::error::{ChainError, Result};
use crate::index::{SparseIndex, StartPoint};

/// The outcome of a resolved lookup.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub entry: &'a Entry,
    pub start: StartPoint,
    /// Successor hops taken from the start point.
    pub steps: u64,
}

/// Combines an entry store with its sparse index.
pub struct Resolver<'a, S: EntryStore> {
    store: &'a S,
    index: &'a SparseIndex,
}

impl<'a, S: EntryStore> Resolver<'a, S> {
    pub fn new(store: &'a S, index: &'a SparseIndex) -> Self {
        Self { store, index }
    }

    /// Find where a walk to `target` should begin.
    pub fn resolve_start(&self, target: u64) -> StartPoint {
        self.index.resolve_start(target, self.store)
    }

    /// Resolve `target` and report how it was reached.
    pub fn locate(&self, target: u64) -> Result<Lookup<'a>> {
        let length = self.store.len();
        if target >= length {
            return Err(ChainError::IndexOutOfRange {
                index: target,
                length,
            });
        }
        let start = self.resolve_start(target);
        walk_to(self.store, start, target)
    }

    /// The payload at `target`.
    pub fn get(&self, target: u64) -> Result<&'a Value> {
        self.locate(target).map(|lookup| &lookup.entry.payload)
    }
}

/// Walk forward from `start` until `target`.
pub fn walk_to<S: EntryStore>(store: &S, start: StartPoint, target: u64) -> Result<Lookup<'_>> {
    let steps = target - start.index;
    store
        .walk(start.index)
        .nth(steps as usize)
        .map(|entry| Lookup {
            entry,
            start,
            steps,
        })
        .ok_or(ChainError::IndexOutOfRange {
            index: target,
            length: store.len(),
        })
}
