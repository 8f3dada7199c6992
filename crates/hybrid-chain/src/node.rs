//! The node: chain, sparse index, optional persisted checkpoints, and
//! optional replication composed behind one API.

use std::sync::Arc;

use serde_json::Value;

use hybrid_chain_core::{
    Appended, ChainConfig, ChainError, Clock, Entry, SharedChain, SystemClock,
};
use hybrid_chain_store::{CheckpointStore, MemoryCheckpointStore, PersistedIndex};
use hybrid_chain_sync::{
    Delivery, MemoryTransport, PeerId, ReplicationLayer, ReplicationState, TcpTransport, Transport,
};

use crate::config::{IndexBacking, NodeConfig};
use crate::error::Result;

/// A node of the hybrid chain.
///
/// - **Writes** go through the Entry Store's verify-then-append, feed the
///   sparse index, are persisted as checkpoints when configured, and are
///   then broadcast. A checkpoint the store refuses stays queued and is
///   retried; it never blocks the write or its broadcast.
/// - **Reads** via [`fetch`](Self::fetch) use the resolver (no chain-wide
///   verification); [`fetch_verified`](Self::fetch_verified) uses the
///   Entry Store's verified walk from head.
pub struct HybridChain<C: CheckpointStore, T: Transport> {
    chain: Arc<SharedChain>,
    persisted: Option<PersistedIndex<C>>,
    replication: Option<ReplicationLayer<T>>,
}

/// A node with no persistence and no peers.
pub type LocalChain = HybridChain<MemoryCheckpointStore, MemoryTransport>;

impl LocalChain {
    /// A standalone in-memory node.
    pub fn local(config: ChainConfig) -> Result<Self> {
        Self::local_with_clock(config, Arc::new(SystemClock))
    }

    /// A standalone in-memory node with an explicit clock.
    pub fn local_with_clock(config: ChainConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            chain: Arc::new(SharedChain::with_clock(config, clock)?),
            persisted: None,
            replication: None,
        })
    }
}

impl<C: CheckpointStore> HybridChain<C, TcpTransport> {
    /// Bind a TCP listener from `config.replication` and open the node on it.
    pub async fn listen(config: NodeConfig, store: C) -> Result<Self> {
        let transport = TcpTransport::bind(&config.replication).await?;
        Self::open(config, store, Some(transport)).await
    }
}

impl<C: CheckpointStore, T: Transport> HybridChain<C, T> {
    /// Open a node. `store` is used only with [`IndexBacking::Persisted`];
    /// `transport` enables replication.
    pub async fn open(config: NodeConfig, store: C, transport: Option<T>) -> Result<Self> {
        Self::open_with_clock(config, store, transport, Arc::new(SystemClock)).await
    }

    /// Open a node with an explicit clock.
    pub async fn open_with_clock(
        config: NodeConfig,
        store: C,
        transport: Option<T>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let chain = Arc::new(SharedChain::with_clock(config.chain.clone(), clock)?);
        let persisted = match config.index {
            IndexBacking::Memory => None,
            IndexBacking::Persisted => {
                let index = PersistedIndex::open(Arc::new(store), config.chain.interval).await?;
                // A new chain starts empty, so any stored checkpoints are stale.
                index.reset().await?;
                Some(index)
            }
        };
        let replication = transport.map(|t| ReplicationLayer::new(Arc::clone(&chain), t));
        Ok(Self {
            chain,
            persisted,
            replication,
        })
    }

    pub fn chain(&self) -> &Arc<SharedChain> {
        &self.chain
    }

    pub fn replication(&self) -> Option<&ReplicationLayer<T>> {
        self.replication.as_ref()
    }

    pub fn persisted_index(&self) -> Option<&PersistedIndex<C>> {
        self.persisted.as_ref()
    }

    pub fn index_backing(&self) -> IndexBacking {
        if self.persisted.is_some() {
            IndexBacking::Persisted
        } else {
            IndexBacking::Memory
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Append `payload` and return the position it was linked at.
    ///
    /// Fails with an integrity error if verification before linking finds
    /// the chain broken; nothing is linked or broadcast in that case. Once
    /// linked, the entry is broadcast even if its checkpoint could not be
    /// stored; see [`pending_checkpoints`](Self::pending_checkpoints).
    pub async fn submit(&self, payload: Value) -> Result<u64> {
        let appended = self.chain.append(payload)?;
        self.persist(&appended).await;
        if let Some(replication) = &self.replication {
            replication.broadcast(&appended.entry).await?;
        }
        Ok(appended.position)
    }

    async fn persist(&self, appended: &Appended) {
        if let (Some(index), Some(checkpoint)) = (&self.persisted, &appended.checkpoint) {
            if let Err(e) = index.record(checkpoint).await {
                tracing::warn!(
                    slot = checkpoint.checkpoint_index,
                    position = appended.position,
                    "checkpoint not stored, will retry: {}",
                    e
                );
            }
        }
    }

    /// Retry writing queued checkpoints to the store.
    pub async fn flush_checkpoints(&self) -> Result<()> {
        if let Some(index) = &self.persisted {
            index.flush().await?;
        }
        Ok(())
    }

    /// Checkpoints linked but not yet stored.
    pub async fn pending_checkpoints(&self) -> usize {
        match &self.persisted {
            Some(index) => index.pending().await,
            None => 0,
        }
    }

    /// Overwrite the payload at `index` without rehashing. Demo and test use only.
    pub fn tamper(&self, index: u64, payload: Value) -> Result<()> {
        Ok(self.chain.tamper(index, payload)?)
    }

    /// Drop every entry and every checkpoint, in memory and persisted.
    pub async fn reset(&self) -> Result<()> {
        self.chain.reset();
        if let Some(index) = &self.persisted {
            index.reset().await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolver read: nearest checkpoint, then a short walk. `None` when out
    /// of range. No chain-wide verification.
    pub async fn fetch(&self, index: u64) -> Result<Option<Value>> {
        let fetched = match &self.persisted {
            None => self.chain.fetch(index),
            Some(persisted) => {
                if index >= self.chain.len() {
                    return Ok(None);
                }
                let reference = persisted.reference_for(index).await?;
                self.chain.locate_with(index, reference).map(|f| f.value)
            }
        };
        not_found_as_none(fetched)
    }

    /// Entry Store read: verification per the chain's mode, then a walk from
    /// head. `None` when out of range.
    pub fn fetch_verified(&self, index: u64) -> Result<Option<Value>> {
        not_found_as_none(self.chain.get_verified(index))
    }

    /// Recompute every digest and link.
    pub fn validate(&self) -> bool {
        self.chain.validate()
    }

    /// Every entry, head first.
    pub fn entries(&self) -> Vec<Entry> {
        self.chain.entries()
    }

    pub fn len(&self) -> u64 {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Replication
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for and apply the next replication message.
    ///
    /// Returns `None` without replication or once the transport closes.
    /// Accepted entries have their checkpoints persisted like local ones,
    /// with the same retry on store failure.
    pub async fn receive_one(&self) -> Result<Option<(PeerId, Delivery)>> {
        let Some(replication) = &self.replication else {
            return Ok(None);
        };
        let Some((peer, delivery)) = replication.next_delivery().await else {
            return Ok(None);
        };
        if let Delivery::Accepted(appended) = &delivery {
            self.persist(appended).await;
        }
        Ok(Some((peer, delivery)))
    }

    /// `Empty` until the first entry is linked, `Growing` after.
    pub fn replication_state(&self) -> ReplicationState {
        if self.chain.is_empty() {
            ReplicationState::Empty
        } else {
            ReplicationState::Growing
        }
    }

    /// Close the transport, if any.
    pub async fn close(&self) {
        if let Some(replication) = &self.replication {
            replication.close().await;
        }
    }
}

fn not_found_as_none(result: hybrid_chain_core::Result<Value>) -> Result<Option<Value>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ChainError::IndexOutOfRange { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
