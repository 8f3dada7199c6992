//! Entry: one hash-linked element of the chain.
//!
//! Entries are created only through the Entry Store's append path (or
//! adopted from a peer after an incremental check) and are never edited
//! afterwards, except by the explicit tamper tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::entry_digest;
use crate::types::EntryHash;

/// A single entry in the hash chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Position in the chain at the time the entry was built.
    pub seq: u64,

    /// Logical or wall-clock time (Unix ms for the system clock).
    pub timestamp: i64,

    /// Opaque application payload.
    pub payload: Value,

    /// Hash of the predecessor, or [`EntryHash::EMPTY`] for genesis.
    pub previous_hash: EntryHash,

    /// Digest over `previous_hash || timestamp || payload`.
    pub hash: EntryHash,
}

impl Entry {
    /// Build an entry and compute its hash.
    pub fn new(seq: u64, timestamp: i64, payload: Value, previous_hash: EntryHash) -> Self {
        let hash = entry_digest(&previous_hash, timestamp, &payload);
        Self {
            seq,
            timestamp,
            payload,
            previous_hash,
            hash,
        }
    }

    /// Recompute the digest from the stored fields.
    pub fn compute_hash(&self) -> EntryHash {
        entry_digest(&self.previous_hash, self.timestamp, &self.payload)
    }

    /// Check that the stored hash matches the stored fields.
    pub fn verify_integrity(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Whether this entry claims to start a chain.
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_empty()
    }

    /// The portable view of this entry, as used by checkpoints and the wire.
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            value: self.payload.clone(),
            hash: self.hash,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
        }
    }
}

/// The `{value, hash, previousHash, timestamp}` view of an entry.
///
/// Carries no position: receivers place it after their own tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub value: Value,
    pub hash: EntryHash,
    #[serde(rename = "previousHash")]
    pub previous_hash: EntryHash,
    pub timestamp: i64,
}

impl EntrySnapshot {
    /// Recompute the digest over the snapshot's own fields.
    pub fn compute_hash(&self) -> EntryHash {
        entry_digest(&self.previous_hash, self.timestamp, &self.value)
    }

    /// Whether the claimed hash matches the claimed fields.
    pub fn is_well_formed(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Turn the snapshot into an entry at `seq`, keeping the claimed hash.
    pub fn into_entry(self, seq: u64) -> Entry {
        Entry {
            seq,
            timestamp: self.timestamp,
            payload: self.value,
            previous_hash: self.previous_hash,
            hash: self.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_verifies() {
        let entry = Entry::new(0, 1000, json!({"task": "write tests"}), EntryHash::EMPTY);
        assert!(entry.verify_integrity());
        assert!(entry.is_genesis());
    }

    #[test]
    fn test_edited_payload_fails_verification() {
        let mut entry = Entry::new(0, 1000, json!("A0"), EntryHash::EMPTY);
        entry.payload = json!("tampered");
        assert!(!entry.verify_integrity());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let entry = Entry::new(0, 5, json!("A0"), EntryHash::EMPTY);
        let json = serde_json::to_value(entry.snapshot()).unwrap();
        assert_eq!(json["value"], json!("A0"));
        assert_eq!(json["previousHash"], json!(""));
        assert_eq!(json["timestamp"], json!(5));
        assert_eq!(json["hash"], json!(entry.hash.to_hex()));
    }

    #[test]
    fn test_snapshot_into_entry_preserves_hash() {
        let entry = Entry::new(3, 77, json!([1, 2, 3]), EntryHash::from_bytes([9; 32]));
        let snapshot = entry.snapshot();
        assert!(snapshot.is_well_formed());
        assert_eq!(snapshot.into_entry(3), entry);
    }
}
