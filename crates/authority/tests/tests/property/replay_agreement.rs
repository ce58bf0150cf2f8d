//! Whatever a run sees, replaying its log reproduces its state hashes.

use std::sync::Arc;

use authority_audit::verify_entries;
use authority_replay::replay;
use authority_tests::{direct, Harness};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Input {
    Valid(u8),
    Junk(Vec<u8>),
    Truncated(u8, usize),
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        (0u8..6).prop_map(Input::Valid),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(Input::Junk),
        ((0u8..6), any::<usize>()).prop_map(|(n, cut)| Input::Truncated(n, cut)),
    ]
}

fn render(input: &Input, cycle: u64) -> Vec<u8> {
    match input {
        Input::Valid(n) => direct(&format!("c-{n}"), cycle),
        Input::Junk(raw) => raw.clone(),
        Input::Truncated(n, cut) => {
            let full = direct(&format!("c-{n}"), cycle);
            full[..cut % full.len()].to_vec()
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn replay_reproduces_any_run(steps in proptest::collection::vec(proptest::collection::vec(input(), 0..6), 1..4)) {
        let mut h = Harness::new();
        for (i, step) in steps.iter().enumerate() {
            let cycle = i as u64 + 1;
            let batch: Vec<_> = step.iter().map(|b| render(b, cycle)).collect();
            h.kernel.step(&batch).unwrap();
        }

        let entries = h.entries();
        prop_assert!(verify_entries(&entries).is_ok());
        let report = replay(&entries, Arc::new(h.config.clone())).unwrap();
        prop_assert_eq!(&report.state_hashes[..], h.kernel.state_hashes());

        // A claim id executes at most once however often it is submitted.
        let effects = h.destination.snapshot();
        let mut ids: Vec<_> = effects.iter().map(|e| e.claim_id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), effects.len());
    }
}
