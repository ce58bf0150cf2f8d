//! A delegate acting inside a root's delegation is admitted and executed,
//! and the warrant it earns is the same in every run.

use std::sync::Arc;

use authority_replay::replay;
use authority_tests::{delegated, Harness};
use authority_types::Classification;

#[test]
fn delegated_claim_executes() {
    let mut h = Harness::new();
    let report = h.kernel.step(&[delegated("c-1", 1)]).unwrap();

    assert_eq!((report.admitted, report.executed, report.refused), (1, 1, 0));
    assert_eq!(h.classifications_of("c-1"), vec![Classification::Valid]);
    let effects = h.destination.snapshot();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].claim_id, "c-1");
    assert_eq!(effects[0].cycle, 1);
}

#[test]
fn warrant_id_is_identical_across_independent_runs() {
    let run = || {
        let mut h = Harness::new();
        h.kernel.step(&[delegated("c-1", 1)]).unwrap();
        (h.warrant_ids(), h.kernel.state_hashes().to_vec())
    };
    let (first_warrants, first_hashes) = run();
    let (second_warrants, second_hashes) = run();

    assert_eq!(first_warrants.len(), 1);
    assert_eq!(first_warrants, second_warrants);
    assert_eq!(first_hashes, second_hashes);
}

#[test]
fn replay_reproduces_every_state_hash() {
    let mut h = Harness::new();
    h.kernel.step(&[delegated("c-1", 1)]).unwrap();
    h.kernel.step(&[delegated("c-2", 2), b"{".to_vec()]).unwrap();
    h.kernel.step(&[]).unwrap();

    let report = replay(&h.entries(), Arc::new(h.config.clone())).unwrap();
    assert_eq!(report.state_hashes, h.kernel.state_hashes());
    assert_eq!(report.cycles(), 3);
    assert!(report.collapsed.is_none());
}
