//! Canonical digest input for entries.
//!
//! An entry's hash is Blake3 over the concatenation
//!
//! ```text
//! hex(previous_hash) || decimal(timestamp) || json(payload)
//! ```
//!
//! with the genesis sentinel contributing zero bytes. Payloads are
//! `serde_json::Value`s; objects serialize with keys in sorted order, so the
//! same value always produces the same bytes on every node.

use serde_json::Value;

use crate::types::EntryHash;

/// Serialize a payload to its canonical JSON bytes.
pub fn payload_bytes(payload: &Value) -> Vec<u8> {
    // Serializing a `Value` cannot fail: every key is already a string.
    serde_json::to_vec(payload).unwrap_or_default()
}

/// Build the digest input for an entry.
pub fn digest_input(previous_hash: &EntryHash, timestamp: i64, payload: &Value) -> Vec<u8> {
    let mut buf = previous_hash.to_hex().into_bytes();
    buf.extend_from_slice(timestamp.to_string().as_bytes());
    buf.extend_from_slice(&payload_bytes(payload));
    buf
}

/// Compute the digest binding an entry to its predecessor.
pub fn entry_digest(previous_hash: &EntryHash, timestamp: i64, payload: &Value) -> EntryHash {
    let input = digest_input(previous_hash, timestamp, payload);
    EntryHash(*blake3::hash(&input).as_bytes())
}
