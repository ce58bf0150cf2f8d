//! Every input gets exactly one outcome, the same one every time.

use std::sync::Arc;

use authority_classifier::ClaimClassifier;
use authority_law::LawState;
use authority_tests::{config, delegated, direct};
use authority_types::Classification;
use proptest::prelude::*;

fn classifier() -> ClaimClassifier {
    ClaimClassifier::new(Arc::new(config()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn arbitrary_bytes_classify_deterministically(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        let c = classifier();
        let law = LawState::from_config(&config());
        let first = c.classify(&raw, &law, 1);
        let second = c.classify(&raw, &law, 1);
        prop_assert_eq!(&first.classification, &second.classification);
        prop_assert_eq!(first.bundle_hash, second.bundle_hash);
        prop_assert_ne!(first.classification, Classification::Valid);
    }

    #[test]
    fn no_proper_prefix_of_a_valid_bundle_is_valid(cut in 0usize..10_000, delegate in any::<bool>()) {
        let full = if delegate { delegated("c-1", 1) } else { direct("c-1", 1) };
        let cut = cut % full.len();
        let c = classifier();
        let law = LawState::from_config(&config());
        prop_assert_eq!(c.classify(&full, &law, 1).classification, Classification::Valid);
        prop_assert_ne!(c.classify(&full[..cut], &law, 1).classification, Classification::Valid);
    }

    #[test]
    fn classification_ignores_surrounding_load(noise in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..32)) {
        // The outcome for a bundle never depends on what else was classified.
        let c = classifier();
        let law = LawState::from_config(&config());
        let target = direct("c-1", 1);
        let alone = c.classify(&target, &law, 1).classification;
        for raw in &noise {
            c.classify(raw, &law, 1);
        }
        prop_assert_eq!(c.classify(&target, &law, 1).classification, alone);
    }
}
