//! Law-state transitions and durable restart.

use std::sync::Arc;

use authority_audit::{verify_file, FileAuditLog};
use authority_gate::FileDestination;
use authority_kernel::Kernel;
use authority_replay::replay_file;
use authority_tests::{config, delegated, direct, policy, Harness};
use authority_types::{Classification, InvalidReason, PolicyOp};
use tempfile::TempDir;

#[test]
fn revoked_delegation_refuses_later_claims() {
    let mut h = Harness::new();
    let revoke = PolicyOp::RevokeDelegation {
        delegation_id: "d-1".into(),
    };
    h.kernel.step(&[policy("p-1", &revoke, 1)]).unwrap();
    assert!(h.kernel.law().is_delegation_revoked("d-1"));

    let report = h.kernel.step(&[delegated("c-1", 2)]).unwrap();
    assert_eq!(report.executed, 0);
    assert_eq!(
        h.classifications_of("c-1"),
        vec![Classification::Invalid(InvalidReason::RevokedCredential)]
    );
}

#[test]
fn advancing_the_epoch_retires_old_delegations() {
    let mut h = Harness::new();
    h.kernel.step(&[policy("p-1", &PolicyOp::AdvanceEpoch, 1)]).unwrap();
    assert_eq!(h.kernel.law().epoch(), 1);

    h.kernel.step(&[delegated("c-1", 2)]).unwrap();
    assert_eq!(
        h.classifications_of("c-1"),
        vec![Classification::Invalid(InvalidReason::EpochMismatch)]
    );
    assert!(h.destination.snapshot().iter().all(|e| e.claim_id != "c-1"));
}

#[test]
fn file_backed_run_survives_restart() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("audit.jsonl");
    let dest_path = dir.path().join("effects.jsonl");
    let open = || {
        Kernel::open(
            config(),
            Arc::new(FileAuditLog::open(&log_path).unwrap()),
            Arc::new(FileDestination::new(&dest_path).unwrap()),
        )
        .unwrap()
    };

    let first = {
        let mut kernel = open();
        kernel.step(&[direct("c-1", 1)]).unwrap();
        kernel.state_hash()
    };

    let mut kernel = open();
    assert_eq!(kernel.state_hash(), first);
    let report = kernel.step(&[direct("c-2", 2), direct("c-1", 2)]).unwrap();
    assert_eq!(report.cycle, 2);
    assert_eq!((report.executed, report.denied), (1, 1));

    verify_file(&log_path).unwrap();
    let replayed = replay_file(&log_path, Arc::new(config())).unwrap();
    assert_eq!(replayed.state_hashes, kernel.state_hashes());
}
