//! # Hybrid Chain Core
//!
//! Pure primitives for the hybrid chain: hash-linked entries, the sparse
//! checkpoint index, and the random-access resolver that combines them.
//!
//! This crate contains no I/O, no storage, no networking. Hashing and chain
//! mutation are synchronous.
//!
//! ## Key Types
//!
//! - [`HashChain`] - The Entry Store: append-only, verify-then-append
//! - [`SparseIndex`] - A checkpoint every `interval` entries
//! - [`Resolver`] - `get(index)` via the nearest checkpoint
//! - [`SharedChain`] - Chain plus index behind a lock, with serialized or racy appends
//!
//! ## Digests
//!
//! Every entry carries `hash = Blake3(hex(previous_hash) || timestamp || json(payload))`.
//! See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod index;
pub mod resolver;
pub mod shared;
pub mod types;

pub use canonical::{digest_input, entry_digest, payload_bytes};
pub use chain::{AdoptRejection, EntryStore, HashChain, VerificationMode, Walk};
pub use clock::{Clock, LogicalClock, SystemClock};
pub use config::{ChainConfig, WriteMode, DEFAULT_INTERVAL};
pub use entry::{Entry, EntrySnapshot};
pub use error::{ChainError, IntegrityViolation, Result};
pub use index::{checkpoint_slot, resolve_start_with, Checkpoint, CheckpointRef, SparseIndex, StartPoint};
pub use resolver::{Lookup, Resolver};
pub use shared::{Appended, ChainState, Fetched, PendingAppend, SharedChain};
pub use types::{EntryHash, HashParseError};
