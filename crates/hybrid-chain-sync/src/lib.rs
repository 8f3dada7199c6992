//! # Hybrid Chain Sync
//!
//! Best-effort replication of newly appended entries between nodes.
//!
//! ## Overview
//!
//! Every local append is announced to all currently connected peers with a
//! single `NEW_BLOCK` message. A receiver links the entry only if it extends
//! the receiver's tail and its digest checks out; anything else is dropped
//! and logged. There is no acknowledgment, retry, backfill, or consensus.
//!
//! ## Key Types
//!
//! - [`ReplicationLayer`] - Composes replication around a [`SharedChain`](hybrid_chain_core::SharedChain)
//! - [`WireMessage`] - The `{"type":"NEW_BLOCK","data":{..}}` frame
//! - [`Transport`] - Frame delivery; [`MemoryNetwork`] for tests, [`TcpTransport`] for sockets
//! - [`ReplicationConfig`] / [`PortAllocator`] - Listener settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hybrid_chain_core::{ChainConfig, SharedChain};
//! use hybrid_chain_sync::{ReplicationConfig, ReplicationLayer, TcpTransport};
//!
//! async fn example() {
//!     let chain = Arc::new(SharedChain::new(ChainConfig::default()).unwrap());
//!     let transport = TcpTransport::bind(&ReplicationConfig::default()).await.unwrap();
//!     // transport.connect("127.0.0.1:6002").await.unwrap();
//!
//!     let node = ReplicationLayer::new(chain, transport);
//!     node.append(serde_json::json!({"task": "ship it"})).await.unwrap();
//!
//!     while let Some((peer, delivery)) = node.next_delivery().await {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Node A                              Node B
//!   |-- append A0                       |
//!   |-------- NEW_BLOCK(A0) ----------->|-- prev == tail, digest ok: link
//!   |-- append A1                       |
//!   |-------- NEW_BLOCK(A1) ---X        |   (lost)
//!   |-- append A2                       |
//!   |-------- NEW_BLOCK(A2) ----------->|-- prev != tail: drop
//! ```

pub mod config;
pub mod error;
pub mod messages;
pub mod replication;
pub mod tcp;
pub mod transport;

pub use config::{PortAllocator, ReplicationConfig, DEFAULT_START_PORT};
pub use error::{Result, SyncError};
pub use messages::{PeerId, WireMessage};
pub use replication::{Delivery, DropReason, ReplicationLayer, ReplicationState};
pub use tcp::TcpTransport;
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
