//! Proptest generators for property-based testing.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value};

use hybrid_chain_core::{ChainConfig, LogicalClock, SharedChain, VerificationMode, WriteMode};

/// Generate a checkpoint interval.
pub fn interval() -> impl Strategy<Value = u64> {
    1u64..=8
}

/// Generate a VerificationMode.
pub fn verification_mode() -> impl Strategy<Value = VerificationMode> {
    prop_oneof![
        Just(VerificationMode::Full),
        Just(VerificationMode::Incremental),
    ]
}

/// Generate a JSON payload: scalars, and arrays and objects of them.
pub fn payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 -]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Generate up to `max_len` payloads.
pub fn payloads(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(payload(), 0..=max_len)
}

/// Parameters for building a chain.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub interval: u64,
    pub verification: VerificationMode,
    pub payloads: Vec<Value>,
}

impl ChainParams {
    pub fn config(&self) -> ChainConfig {
        ChainConfig {
            interval: self.interval,
            verification: self.verification,
            write_mode: WriteMode::Serialized,
        }
    }
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (interval(), verification_mode(), payloads(24))
            .prop_map(|(interval, verification, payloads)| ChainParams {
                interval,
                verification,
                payloads,
            })
            .boxed()
    }
}

/// Build a chain from parameters, with a logical clock starting at zero.
///
/// The same parameters always produce the same hashes.
pub fn chain_from_params(params: &ChainParams) -> SharedChain {
    let chain = SharedChain::with_clock(params.config(), Arc::new(LogicalClock::default()))
        .unwrap_or_else(|e| panic!("invalid chain params {:?}: {}", params, e));
    for payload in &params.payloads {
        if let Err(e) = chain.append(payload.clone()) {
            panic!("append failed on a fresh chain: {}", e);
        }
    }
    chain
}
