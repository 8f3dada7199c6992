//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use rand::Rng;
use serde_json::{json, Value};

use hybrid_chain::{
    ChainConfig, HybridChain, IndexBacking, MemoryCheckpointStore, MemoryNetwork, MemoryTransport,
    NodeConfig, Result,
};
use hybrid_chain_core::{LogicalClock, SharedChain};
use hybrid_chain_sync::Transport;

/// A node wired to the in-memory network and checkpoint store.
pub type MemoryNode = HybridChain<MemoryCheckpointStore, MemoryTransport>;

/// `"A0"`, `"A1"`, ... as JSON strings.
pub fn payload_sequence(prefix: &str, count: usize) -> Vec<Value> {
    (0..count).map(|i| json!(format!("{}{}", prefix, i))).collect()
}

/// `{"id": i, "data": "Data-<random>"}` payloads.
pub fn random_payloads(count: usize) -> Vec<Value> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| json!({ "id": i, "data": format!("Data-{}", rng.gen::<u32>()) }))
        .collect()
}

/// A chain config with the given interval and defaults otherwise.
pub fn config_with_interval(interval: u64) -> ChainConfig {
    ChainConfig {
        interval,
        ..Default::default()
    }
}

/// A shared chain on a logical clock, pre-filled with `payloads`.
pub fn filled_chain(config: ChainConfig, payloads: &[Value]) -> SharedChain {
    let chain = SharedChain::with_clock(config, Arc::new(LogicalClock::default()))
        .unwrap_or_else(|e| panic!("bad chain config: {}", e));
    for payload in payloads {
        if let Err(e) = chain.append(payload.clone()) {
            panic!("append failed: {}", e);
        }
    }
    chain
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Several nodes on one [`MemoryNetwork`].
pub struct Mesh {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<MemoryNode>,
}

impl Mesh {
    /// `count` unlinked nodes.
    pub async fn unlinked(count: usize, config: NodeConfig) -> Result<Self> {
        let network = MemoryNetwork::new();
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let transport = network.create_transport().await;
            nodes.push(
                HybridChain::open_with_clock(
                    config.clone(),
                    MemoryCheckpointStore::new(),
                    Some(transport),
                    Arc::new(LogicalClock::default()),
                )
                .await?,
            );
        }
        Ok(Self { network, nodes })
    }

    /// Every node linked to every other.
    pub async fn fully_connected(count: usize, config: NodeConfig) -> Result<Self> {
        let mesh = Self::unlinked(count, config).await?;
        for i in 0..count {
            for j in (i + 1)..count {
                mesh.link(i, j).await;
            }
        }
        Ok(mesh)
    }

    /// Node `i` linked only to node `i + 1`.
    pub async fn line(count: usize, config: NodeConfig) -> Result<Self> {
        let mesh = Self::unlinked(count, config).await?;
        for i in 1..count {
            mesh.link(i - 1, i).await;
        }
        Ok(mesh)
    }

    /// A two-node mesh with persisted checkpoints on both sides.
    pub async fn persisted_pair(chain: ChainConfig) -> Result<Self> {
        let config = NodeConfig {
            chain,
            index: IndexBacking::Persisted,
            ..Default::default()
        };
        Self::fully_connected(2, config).await
    }

    pub fn node(&self, i: usize) -> &MemoryNode {
        &self.nodes[i]
    }

    pub async fn link(&self, a: usize, b: usize) {
        self.network.connect(self.transport(a).id(), self.transport(b).id()).await;
    }

    pub async fn unlink(&self, a: usize, b: usize) {
        self.network
            .disconnect(self.transport(a).id(), self.transport(b).id())
            .await;
    }

    /// Node `i`'s transport.
    pub fn transport(&self, i: usize) -> &MemoryTransport {
        match self.nodes[i].replication() {
            Some(replication) => replication.transport(),
            None => panic!("mesh node {} has no transport", i),
        }
    }

    /// Apply `count` incoming messages on node `i`, returning how many were
    /// accepted.
    pub async fn deliver(&self, i: usize, count: usize) -> Result<usize> {
        let mut accepted = 0;
        for _ in 0..count {
            match self.nodes[i].receive_one().await? {
                Some((_, delivery)) if delivery.is_accepted() => accepted += 1,
                Some(_) => {}
                None => break,
            }
        }
        Ok(accepted)
    }

    /// Whether node `i` has any neighbours.
    pub async fn is_linked(&self, i: usize) -> bool {
        !self.transport(i).connected_peers().await.is_empty()
    }
}
