//! Digest vectors checked through the public node API.

use std::sync::Arc;

use hybrid_chain::core::{entry_digest, EntryHash, LogicalClock};
use hybrid_chain::{ChainConfig, LocalChain};
use hybrid_chain_testkit::vectors::{all_vectors, entry_from_vector, verify_all_vectors};
use serde_json::json;

#[test]
fn golden_digest_inputs_match() {
    for (name, matches, hash) in verify_all_vectors() {
        assert!(matches, "vector '{}' digest input mismatch (hash {})", name, hash);
    }
}

#[test]
fn golden_entries_verify() {
    for vector in all_vectors() {
        let entry = entry_from_vector(&vector);
        assert!(entry.verify_integrity(), "vector '{}'", vector.name);
        assert_eq!(entry.is_genesis(), vector.previous_hash.is_none());
    }
}

#[tokio::test]
async fn node_hashes_match_hand_built_chain() {
    let node = LocalChain::local_with_clock(
        ChainConfig::default(),
        Arc::new(LogicalClock::starting_at(100)),
    )
    .unwrap();
    node.submit(json!("A0")).await.unwrap();
    node.submit(json!({"id": 1})).await.unwrap();

    let h0 = entry_digest(&EntryHash::EMPTY, 100, &json!("A0"));
    let h1 = entry_digest(&h0, 101, &json!({"id": 1}));

    let entries = node.entries();
    assert_eq!(entries[0].hash, h0);
    assert_eq!(entries[1].previous_hash, h0);
    assert_eq!(entries[1].hash, h1);
}
