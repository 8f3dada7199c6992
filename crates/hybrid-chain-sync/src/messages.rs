//! Replication wire format.
//!
//! One message type, JSON-shaped, no versioning, no authentication:
//!
//! ```text
//! {"type":"NEW_BLOCK","data":{"value":..,"hash":"..","previousHash":"..","timestamp":..}}
//! ```
//!
//! One message per appended entry, in append order from the sender.

use std::fmt;

use serde::{Deserialize, Serialize};

use hybrid_chain_core::{Entry, EntrySnapshot};

use crate::error::{Result, SyncError};

/// A connected peer channel, as seen from one transport.
///
/// Identifiers are local to the transport that assigned them and carry no
/// identity beyond "currently connected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Replication messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WireMessage {
    /// A newly appended entry.
    #[serde(rename = "NEW_BLOCK")]
    NewBlock(EntrySnapshot),
}

impl WireMessage {
    /// Announce `entry`.
    pub fn new_block(entry: &Entry) -> Self {
        WireMessage::NewBlock(entry.snapshot())
    }

    /// Serialize to a JSON frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SyncError::Encode(e.to_string()))
    }

    /// Parse a JSON frame. Unknown types and missing fields are errors.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_chain_core::EntryHash;
    use serde_json::{json, Value};

    #[test]
    fn test_new_block_shape() {
        let entry = Entry::new(0, 1_700_000_000_000, json!({"id": 1, "data": "Data-1"}), EntryHash::EMPTY);
        let frame = WireMessage::new_block(&entry).encode().unwrap();
        let value: Value = serde_json::from_slice(&frame).unwrap();

        assert_eq!(value["type"], json!("NEW_BLOCK"));
        assert_eq!(value["data"]["value"], json!({"id": 1, "data": "Data-1"}));
        assert_eq!(value["data"]["hash"], json!(entry.hash.to_hex()));
        assert_eq!(value["data"]["previousHash"], json!(""));
        assert_eq!(value["data"]["timestamp"], json!(1_700_000_000_000i64));
        assert!(!frame.contains(&b'\n'));
    }

    #[test]
    fn test_decode_accepts_foreign_frame() {
        let entry = Entry::new(3, 42, json!("A3"), EntryHash::from_bytes([5; 32]));
        let frame = format!(
            r#"{{"type":"NEW_BLOCK","data":{{"timestamp":42,"previousHash":"{}","value":"A3","hash":"{}"}}}}"#,
            entry.previous_hash.to_hex(),
            entry.hash.to_hex()
        );
        let WireMessage::NewBlock(snapshot) = WireMessage::decode(frame.as_bytes()).unwrap();
        assert!(snapshot.is_well_formed());
        assert_eq!(snapshot, entry.snapshot());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let frames: [&[u8]; 4] = [
            b"not json",
            br#"{"type":"CHAIN_REQUEST","data":{}}"#,
            br#"{"type":"NEW_BLOCK","data":{"value":1}}"#,
            br#"{"type":"NEW_BLOCK","data":{"value":1,"hash":"zz","previousHash":"","timestamp":0}}"#,
        ];
        for frame in frames {
            assert!(matches!(WireMessage::decode(frame), Err(SyncError::Decode(_))));
        }
    }

    #[test]
    fn test_decode_rejects_spelled_out_genesis() {
        let entry = Entry::new(0, 42, json!("A0"), EntryHash::EMPTY);
        let frame = format!(
            r#"{{"type":"NEW_BLOCK","data":{{"timestamp":42,"previousHash":"{}","value":"A0","hash":"{}"}}}}"#,
            "0".repeat(64),
            entry.hash.to_hex()
        );
        assert!(matches!(
            WireMessage::decode(frame.as_bytes()),
            Err(SyncError::Decode(_))
        ));
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId(7).to_string(), "peer-7");
    }
}
