//! Random access through the resolver, with both checkpoint backings.

use std::sync::Arc;

use hybrid_chain::core::LogicalClock;
use hybrid_chain::{
    ChainConfig, HybridChain, IndexBacking, LocalChain, MemoryCheckpointStore, MemoryTransport,
    NodeConfig, SqliteCheckpointStore,
};
use hybrid_chain_testkit::{config_with_interval, payload_sequence};
use serde_json::json;
use tempfile::TempDir;

fn persisted_config(interval: u64) -> NodeConfig {
    NodeConfig {
        chain: config_with_interval(interval),
        index: IndexBacking::Persisted,
        ..Default::default()
    }
}

#[tokio::test]
async fn seven_entries_interval_three() {
    let node = LocalChain::local(config_with_interval(3)).unwrap();
    for p in payload_sequence("A", 7) {
        node.submit(p).await.unwrap();
    }

    let checkpoints = node.chain().checkpoints();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0].referenced_hash, node.entries()[2].hash);
    assert_eq!(checkpoints[1].referenced_hash, node.entries()[5].hash);

    let located = node.chain().locate(5).unwrap();
    assert_eq!(located.value, json!("A5"));
    assert_eq!(located.start.index, 3);
    assert!(located.steps <= 3);

    for i in 0..7u64 {
        assert_eq!(node.fetch(i).await.unwrap(), Some(json!(format!("A{}", i))));
    }
    assert_eq!(node.fetch(7).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_backed_reads() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCheckpointStore::open(dir.path().join("checkpoints.db")).unwrap();
    let node: HybridChain<SqliteCheckpointStore, MemoryTransport> =
        HybridChain::open(persisted_config(3), store, None).await.unwrap();

    for p in payload_sequence("A", 10) {
        node.submit(p).await.unwrap();
    }

    let index = node.persisted_index().unwrap();
    assert_eq!(hybrid_chain::CheckpointStore::len(index.store()).await.unwrap(), 3);
    for i in 0..10u64 {
        assert_eq!(node.fetch(i).await.unwrap(), Some(json!(format!("A{}", i))));
    }
}

#[tokio::test]
async fn reopened_node_discards_stale_checkpoints() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoints.db");

    {
        let store = SqliteCheckpointStore::open(&path).unwrap();
        let node: HybridChain<_, MemoryTransport> =
            HybridChain::open(persisted_config(2), store, None).await.unwrap();
        for p in payload_sequence("old", 6) {
            node.submit(p).await.unwrap();
        }
    }

    let store = SqliteCheckpointStore::open(&path).unwrap();
    let node: HybridChain<_, MemoryTransport> =
        HybridChain::open(persisted_config(2), store, None).await.unwrap();
    for p in payload_sequence("new", 4) {
        node.submit(p).await.unwrap();
    }
    assert_eq!(node.fetch(3).await.unwrap(), Some(json!("new3")));
    assert_eq!(node.fetch(4).await.unwrap(), None);
}

#[tokio::test]
async fn checkpoint_store_reset_falls_back_to_head() {
    let node: HybridChain<MemoryCheckpointStore, MemoryTransport> = HybridChain::open_with_clock(
        persisted_config(3),
        MemoryCheckpointStore::new(),
        None,
        Arc::new(LogicalClock::default()),
    )
    .await
    .unwrap();
    for p in payload_sequence("A", 7) {
        node.submit(p).await.unwrap();
    }

    // Clear the store behind the node's back: reads still succeed from head.
    node.persisted_index().unwrap().reset().await.unwrap();
    for i in 0..7u64 {
        assert_eq!(node.fetch(i).await.unwrap(), Some(json!(format!("A{}", i))));
    }
}

#[tokio::test]
async fn tamper_is_visible_only_to_verified_reads() {
    let node = LocalChain::local(ChainConfig::default()).unwrap();
    for p in payload_sequence("A", 7) {
        node.submit(p).await.unwrap();
    }
    node.tamper(2, json!("forged")).unwrap();

    assert!(!node.validate());
    assert_eq!(node.fetch(2).await.unwrap(), Some(json!("forged")));
    assert_eq!(node.fetch(4).await.unwrap(), Some(json!("A4")));
    assert!(node.fetch_verified(4).unwrap_err().is_integrity());

    let violation = node.chain().find_violation().unwrap();
    assert_eq!(violation.position(), 2);

    node.reset().await.unwrap();
    assert!(node.is_empty());
    assert!(node.validate());
}
