//! Transport abstraction for replication.
//!
//! A transport moves opaque frames between this node and whichever peers
//! are currently connected. Delivery is best effort: no acknowledgment,
//! no retry, no ordering across peers. Sends never wait on a slow peer; a
//! full queue drops the frame for that peer.

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::PeerId;

/// Sending and receiving frames over persistent peer channels.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a frame to every connected peer.
    ///
    /// Returns how many peers it was handed to. Per-peer failures are
    /// logged and skipped.
    async fn broadcast(&self, frame: &[u8]) -> usize;

    /// Send a frame to one peer.
    async fn send(&self, peer: PeerId, frame: &[u8]) -> Result<()>;

    /// Receive the next frame from any peer.
    ///
    /// Waits until one arrives; returns `None` once the transport is closed.
    async fn recv(&self) -> Option<(PeerId, Vec<u8>)>;

    /// Peers currently connected.
    async fn connected_peers(&self) -> Vec<PeerId>;

    /// Stop accepting and drop every peer channel.
    async fn close(&self);
}

/// An in-memory transport for tests.
///
/// Nodes join a shared [`MemoryNetwork`] and are linked explicitly, so a
/// test controls who hears whom.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc::error::TrySendError;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::SyncError;

    type Frame = (PeerId, Vec<u8>);

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        next_id: AtomicU64,
        capacity: usize,
        /// Inbound queue of each node.
        inboxes: RwLock<HashMap<PeerId, mpsc::Sender<Frame>>>,
        /// Undirected links, stored with the smaller id first.
        links: RwLock<HashSet<(PeerId, PeerId)>>,
    }

    fn link_key(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Self::with_capacity(1024)
        }

        /// Create a network whose inbound queues hold `capacity` frames.
        pub fn with_capacity(capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
                inboxes: RwLock::new(HashMap::new()),
                links: RwLock::new(HashSet::new()),
            })
        }

        /// Create a transport attached to this network, with no links yet.
        pub async fn create_transport(self: &Arc<Self>) -> MemoryTransport {
            let id = PeerId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let (tx, rx) = mpsc::channel(self.capacity);
            self.inboxes.write().await.insert(id, tx);

            MemoryTransport {
                id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
                drop_next: AtomicUsize::new(0),
            }
        }

        /// Open a duplex channel between two nodes.
        pub async fn connect(&self, a: PeerId, b: PeerId) {
            if a != b {
                self.links.write().await.insert(link_key(a, b));
                tracing::info!(%a, %b, "peers connected");
            }
        }

        /// Close the channel between two nodes.
        pub async fn disconnect(&self, a: PeerId, b: PeerId) {
            if self.links.write().await.remove(&link_key(a, b)) {
                tracing::info!(%a, %b, "peers disconnected");
            }
        }

        async fn neighbours(&self, of: PeerId) -> Vec<PeerId> {
            let mut peers: Vec<PeerId> = self
                .links
                .read()
                .await
                .iter()
                .filter_map(|&(a, b)| match (a == of, b == of) {
                    (true, _) => Some(b),
                    (_, true) => Some(a),
                    _ => None,
                })
                .collect();
            peers.sort();
            peers
        }

        async fn deliver(&self, from: PeerId, to: PeerId, frame: Vec<u8>) -> Result<()> {
            let inbox = self
                .inboxes
                .read()
                .await
                .get(&to)
                .cloned()
                .ok_or(SyncError::PeerNotConnected(to))?;
            inbox.try_send((from, frame)).map_err(|e| match e {
                TrySendError::Full(_) => SyncError::QueueFull(to),
                TrySendError::Closed(_) => SyncError::PeerNotConnected(to),
            })
        }

        async fn leave(&self, id: PeerId) {
            self.inboxes.write().await.remove(&id);
            self.links.write().await.retain(|&(a, b)| a != id && b != id);
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Frame>>,
        drop_next: AtomicUsize,
    }

    impl MemoryTransport {
        /// This node's id on the network.
        pub fn id(&self) -> PeerId {
            self.id
        }

        /// Silently lose the next incoming frame, as if it never arrived.
        pub fn drop_next_incoming(&self) {
            self.drop_next.fetch_add(1, Ordering::SeqCst);
        }

        /// Take a queued frame without waiting.
        pub async fn try_recv(&self) -> Option<Frame> {
            let mut rx = self.receiver.lock().await;
            loop {
                let frame = rx.try_recv().ok()?;
                if !self.consume_drop() {
                    return Some(frame);
                }
            }
        }

        fn consume_drop(&self) -> bool {
            let lost = self
                .drop_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                tracing::debug!(node = %self.id, "incoming frame lost");
            }
            lost
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn broadcast(&self, frame: &[u8]) -> usize {
            let mut delivered = 0;
            for peer in self.network.neighbours(self.id).await {
                match self.network.deliver(self.id, peer, frame.to_vec()).await {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(from = %self.id, %peer, "skipping peer: {}", e),
                }
            }
            delivered
        }

        async fn send(&self, peer: PeerId, frame: &[u8]) -> Result<()> {
            if !self.network.neighbours(self.id).await.contains(&peer) {
                return Err(SyncError::PeerNotConnected(peer));
            }
            self.network.deliver(self.id, peer, frame.to_vec()).await
        }

        async fn recv(&self) -> Option<(PeerId, Vec<u8>)> {
            let mut rx = self.receiver.lock().await;
            loop {
                let frame = rx.recv().await?;
                if !self.consume_drop() {
                    return Some(frame);
                }
            }
        }

        async fn connected_peers(&self) -> Vec<PeerId> {
            self.network.neighbours(self.id).await
        }

        async fn close(&self) {
            self.network.leave(self.id).await;
            self.receiver.lock().await.close();
            tracing::info!(node = %self.id, "transport closed");
        }
    }
}
