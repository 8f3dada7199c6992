//! # Hybrid Chain Testkit
//!
//! Testing utilities for Hybrid Chain.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Digest vectors**: known digest inputs every node must reproduce
//! - **Generators**: Proptest strategies for payloads and whole chains
//! - **Fixtures**: payload sequences, pre-filled chains, multi-node meshes
//!
//! ## Digest Vectors
//!
//! ```rust
//! use hybrid_chain_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hash) in verify_all_vectors() {
//!     assert!(matches, "{}", name);
//!     println!("{}: {}", name, hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hybrid_chain_testkit::generators::{chain_from_params, ChainParams};
//!
//! proptest! {
//!     #[test]
//!     fn chain_validates(params: ChainParams) {
//!         prop_assert!(chain_from_params(&params).validate());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use hybrid_chain::NodeConfig;
//! use hybrid_chain_testkit::fixtures::Mesh;
//!
//! let mesh = Mesh::fully_connected(3, NodeConfig::default()).await?;
//! mesh.node(0).submit(serde_json::json!("A0")).await?;
//! mesh.deliver(1, 1).await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    config_with_interval, filled_chain, init_tracing, payload_sequence, random_payloads, Mesh,
    MemoryNode,
};
pub use generators::{chain_from_params, ChainParams};
pub use vectors::{all_vectors, entry_from_vector, verify_all_vectors, DigestVector};
