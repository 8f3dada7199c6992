//! The replication layer: broadcast local appends, adopt well-formed
//! remote ones.
//!
//! ```text
//!           append                     NEW_BLOCK
//! caller ----------> chain --------------------------> peers
//!
//! peer ---NEW_BLOCK---> previousHash == tail && digest ok ?
//!                         yes: link, no re-broadcast
//!                         no:  drop, log, length unchanged
//! ```
//!
//! A remote entry is checked on its own (link to our tail plus its own
//! digest); the chain-wide verification of a local append is skipped. There
//! is no fork resolution and no catch-up: a node that missed a message
//! drops everything after it until resynced out of band.

use std::sync::Arc;

use serde_json::Value;

use hybrid_chain_core::{AdoptRejection, Appended, Entry, EntryHash, SharedChain};

use crate::error::Result;
use crate::messages::{PeerId, WireMessage};
use crate::transport::Transport;

/// Per-chain replication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationState {
    /// Nothing appended or accepted yet.
    Empty,
    /// At least one entry linked.
    Growing,
}

/// Why an incoming message was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not a well-formed `NEW_BLOCK` frame.
    Malformed(String),
    /// Does not extend our tail: stale, or an intermediate entry is missing.
    StalePredecessor { tail: EntryHash, claimed: EntryHash },
    /// Claimed hash does not match the claimed fields.
    HashMismatch { claimed: EntryHash, computed: EntryHash },
}

impl From<AdoptRejection> for DropReason {
    fn from(rejection: AdoptRejection) -> Self {
        match rejection {
            AdoptRejection::StalePredecessor { tail, claimed } => {
                DropReason::StalePredecessor { tail, claimed }
            }
            AdoptRejection::HashMismatch { claimed, computed } => {
                DropReason::HashMismatch { claimed, computed }
            }
        }
    }
}

/// Outcome of applying one incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Accepted(Appended),
    Dropped(DropReason),
}

impl Delivery {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Delivery::Accepted(_))
    }
}

/// Replication composed around a shared chain.
pub struct ReplicationLayer<T: Transport> {
    chain: Arc<SharedChain>,
    transport: T,
}

impl<T: Transport> ReplicationLayer<T> {
    pub fn new(chain: Arc<SharedChain>, transport: T) -> Self {
        Self { chain, transport }
    }

    pub fn chain(&self) -> &Arc<SharedChain> {
        &self.chain
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `Empty` until the first entry is linked.
    pub fn state(&self) -> ReplicationState {
        if self.chain.is_empty() {
            ReplicationState::Empty
        } else {
            ReplicationState::Growing
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Append locally, then announce the new entry to every connected peer.
    ///
    /// Fails only if the local append fails; delivery is fire-and-forget.
    pub async fn append(&self, payload: Value) -> Result<Appended> {
        let appended = self.chain.append(payload)?;
        self.broadcast(&appended.entry).await?;
        Ok(appended)
    }

    /// Send `NEW_BLOCK` for `entry` to every connected peer.
    ///
    /// Returns how many peers it was handed to.
    pub async fn broadcast(&self, entry: &Entry) -> Result<usize> {
        let frame = WireMessage::new_block(entry).encode()?;
        let peers = self.transport.broadcast(&frame).await;
        tracing::debug!(seq = entry.seq, hash = %entry.hash.short(), peers, "broadcast NEW_BLOCK");
        Ok(peers)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide on one incoming frame. Accepted entries are not re-broadcast.
    pub fn apply(&self, frame: &[u8]) -> Delivery {
        let snapshot = match WireMessage::decode(frame) {
            Ok(WireMessage::NewBlock(snapshot)) => snapshot,
            Err(e) => {
                tracing::warn!("dropping message: {}", e);
                return Delivery::Dropped(DropReason::Malformed(e.to_string()));
            }
        };

        match self.chain.try_adopt(snapshot) {
            Ok(appended) => {
                tracing::debug!(
                    seq = appended.entry.seq,
                    hash = %appended.entry.hash.short(),
                    "accepted remote entry"
                );
                Delivery::Accepted(appended)
            }
            Err(rejection) => {
                let reason = DropReason::from(rejection);
                tracing::warn!(?reason, len = self.chain.len(), "dropping NEW_BLOCK");
                Delivery::Dropped(reason)
            }
        }
    }

    /// Wait for the next frame and apply it. `None` once the transport closes.
    pub async fn next_delivery(&self) -> Option<(PeerId, Delivery)> {
        let (peer, frame) = self.transport.recv().await?;
        Some((peer, self.apply(&frame)))
    }

    /// Close the transport. Local reads and appends keep working.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}
