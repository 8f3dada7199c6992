//! Digest-input vectors.
//!
//! These pin the exact bytes an entry hash is computed over, so any node
//! that hashes entries the same way can check itself against them.

use serde_json::Value;

use hybrid_chain_core::{digest_input, Entry, EntryHash};

/// A known digest input.
#[derive(Debug, Clone)]
pub struct DigestVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Predecessor hash bytes, or `None` for genesis.
    pub previous_hash: Option<[u8; 32]>,
    /// Timestamp.
    pub timestamp: i64,
    /// Payload as JSON text, in any key order.
    pub payload: &'static str,
    /// Expected digest input, as text.
    pub expected_input: &'static str,
}

impl DigestVector {
    pub fn previous(&self) -> EntryHash {
        self.previous_hash
            .map(EntryHash::from_bytes)
            .unwrap_or(EntryHash::EMPTY)
    }

    pub fn payload_value(&self) -> Value {
        serde_json::from_str(self.payload).unwrap_or(Value::Null)
    }
}

/// Get all digest vectors.
pub fn all_vectors() -> Vec<DigestVector> {
    vec![
        DigestVector {
            name: "genesis string payload",
            previous_hash: None,
            timestamp: 1736870400000,
            payload: r#""A0""#,
            expected_input: r#"1736870400000"A0""#,
        },
        DigestVector {
            name: "linked object payload",
            previous_hash: Some([0xab; 32]),
            timestamp: 1,
            payload: r#"{"id":1,"data":"Data-1"}"#,
            expected_input: concat!(
                "abababababababababababababababababababababababababababababababab",
                "1",
                r#"{"data":"Data-1","id":1}"#
            ),
        },
        DigestVector {
            name: "nested payload, negative timestamp",
            previous_hash: Some([0x01; 32]),
            timestamp: -5,
            payload: r#"{"z":[1,2.5,null],"a":{"y":true,"x":"é"}}"#,
            expected_input: concat!(
                "0101010101010101010101010101010101010101010101010101010101010101",
                "-5",
                r#"{"a":{"x":"é","y":true},"z":[1,2.5,null]}"#
            ),
        },
        DigestVector {
            name: "genesis null payload",
            previous_hash: None,
            timestamp: 0,
            payload: "null",
            expected_input: "0null",
        },
    ]
}

/// Build the entry a vector describes, at position 0.
pub fn entry_from_vector(vector: &DigestVector) -> Entry {
    Entry::new(0, vector.timestamp, vector.payload_value(), vector.previous())
}

/// Check every vector's digest input.
///
/// Returns `(name, matches, entry hash hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let input = digest_input(&v.previous(), v.timestamp, &v.payload_value());
            let matches = input == v.expected_input.as_bytes();
            let hash = entry_from_vector(v).hash.to_hex();
            (v.name.to_string(), matches, hash)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, _) in verify_all_vectors() {
            assert!(matches, "vector '{}' produced a different digest input", name);
        }
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let e1 = entry_from_vector(&vector);
            let e2 = entry_from_vector(&vector);
            assert_eq!(e1.hash, e2.hash, "vector '{}' hashed differently", vector.name);
            assert!(e1.verify_integrity());
        }
    }

    #[test]
    fn test_hashes_are_distinct() {
        let mut hashes: Vec<String> = verify_all_vectors().into_iter().map(|(_, _, h)| h).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), all_vectors().len());
    }

    #[test]
    fn test_hash_hex_is_lowercase_64() {
        for (_, _, hash) in verify_all_vectors() {
            assert_eq!(hash.len(), 64);
            assert!(hex::decode(&hash).is_ok());
            assert_eq!(hash, hash.to_lowercase());
        }
    }
}
