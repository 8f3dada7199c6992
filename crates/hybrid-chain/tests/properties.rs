//! Read-path equivalence across arbitrary chains.

use proptest::prelude::*;

use hybrid_chain_testkit::generators::{chain_from_params, ChainParams};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn resolver_and_verified_reads_agree(params: ChainParams) {
        let chain = chain_from_params(&params);
        for i in 0..chain.len() {
            let resolved = chain.locate(i).unwrap();
            prop_assert_eq!(&resolved.value, &chain.get_verified(i).unwrap());
            prop_assert!(resolved.steps <= params.interval);
            prop_assert!(resolved.start.index <= i);
        }
    }

    #[test]
    fn tamper_never_changes_resolver_output_elsewhere(
        params in any::<ChainParams>(),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!params.payloads.is_empty());
        let chain = chain_from_params(&params);
        let target = pick.index(params.payloads.len()) as u64;
        chain.tamper(target, serde_json::json!({"FORGED": true})).unwrap();

        prop_assert!(!chain.validate());
        for i in 0..chain.len() {
            if i != target {
                prop_assert_eq!(&chain.fetch(i).unwrap(), &params.payloads[i as usize]);
            }
        }
    }
}
