//! Edits to a finished log are caught: unsealed edits by verification,
//! re-sealed edits by replay, at the first corrupted cycle.

use std::sync::Arc;

use authority_audit::{
    verify_entries, verify_file, AuditEntry, AuditError, AuditEvent, BreakReason,
    CollapseReason, FileAuditLog,
};
use authority_gate::MemoryDestination;
use authority_kernel::{Kernel, KernelError};
use authority_law::KernelConfig;
use authority_replay::{replay, DivergenceKind, ReplayError};
use authority_tests::{config, direct, reseal, Harness};
use authority_types::Classification;
use tempfile::TempDir;

fn three_cycles() -> Harness {
    let mut h = Harness::new();
    h.kernel.step(&[direct("c-1", 1), b"[]".to_vec()]).unwrap();
    h.kernel.step(&[direct("c-2", 2), b"{}".to_vec()]).unwrap();
    h.kernel.step(&[direct("c-3", 3)]).unwrap();
    h
}

#[test]
fn flipped_byte_in_log_file_breaks_the_chain_there() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    {
        let log = Arc::new(FileAuditLog::open(&path).unwrap());
        let mut kernel =
            Kernel::open(config(), log, Arc::new(MemoryDestination::new())).unwrap();
        kernel.step(&[direct("c-1", 1), b"[]".to_vec()]).unwrap();
    }
    verify_file(&path).unwrap();

    // "[]" is logged as raw hex 5b5d; make it 5b5e.
    let text = std::fs::read_to_string(&path).unwrap();
    let (index, _) = text
        .lines()
        .enumerate()
        .find(|(_, line)| line.contains("\"5b5d\""))
        .unwrap();
    std::fs::write(&path, text.replacen("\"5b5d\"", "\"5b5e\"", 1)).unwrap();

    match verify_file(&path) {
        Err(AuditError::ChainBroken { index: at, reason }) => {
            assert_eq!(at, index as u64);
            assert_eq!(reason, BreakReason::HashMismatch);
        }
        other => panic!("expected a chain break, got {other:?}"),
    }
    assert!(FileAuditLog::open(&path).is_err());
}

#[test]
fn dropped_entry_is_a_sequence_gap() {
    let h = three_cycles();
    let mut entries = h.entries();
    entries.remove(5);
    match verify_entries(&entries) {
        Err(AuditError::ChainBroken { index, .. }) => assert_eq!(index, 5),
        other => panic!("expected a chain break, got {other:?}"),
    }
}

#[test]
fn resealed_forgery_diverges_at_the_first_corrupted_cycle() {
    let h = three_cycles();
    let entries = h.entries();
    let (index, forged) = entries
        .iter()
        .enumerate()
        .find_map(|(i, e)| match &e.event {
            AuditEvent::ClaimClassified {
                position,
                bundle_hash,
                claim_id: None,
                refusal_token,
                ..
            } if e.cycle() == 2 => Some((
                i,
                AuditEvent::ClaimClassified {
                    position: *position,
                    bundle_hash: *bundle_hash,
                    claim_id: None,
                    classification: Classification::Valid,
                    refusal_token: *refusal_token,
                },
            )),
            _ => None,
        })
        .unwrap();
    let forged = reseal(&entries, index, forged);
    verify_entries(&forged).unwrap();

    match replay(&forged, Arc::new(h.config.clone())) {
        Err(ReplayError::Divergence(d)) => {
            assert_eq!(d.cycle, 2);
            assert_eq!(d.entry_index, index as u64);
            assert!(matches!(d.kind, DivergenceKind::Classification { .. }));
        }
        other => panic!("expected divergence, got {other:?}"),
    }
}

#[test]
fn resealed_state_hash_is_recomputed() {
    let h = three_cycles();
    let entries = h.entries();
    let (index, forged) = entries
        .iter()
        .enumerate()
        .find_map(|(i, e)| match &e.event {
            AuditEvent::StepCommitted {
                cycle: 3,
                stream_hashes,
                ..
            } => Some((
                i,
                AuditEvent::StepCommitted {
                    cycle: 3,
                    stream_hashes: stream_hashes.clone(),
                    state_hash: authority_canonical::hash_bytes(b"forged"),
                },
            )),
            _ => None,
        })
        .unwrap();

    match replay(&reseal(&entries, index, forged), Arc::new(h.config.clone())) {
        Err(ReplayError::Divergence(d)) => {
            assert_eq!(d.cycle, 3);
            assert!(matches!(d.kind, DivergenceKind::StateHash { .. }));
        }
        other => panic!("expected divergence, got {other:?}"),
    }
}

#[test]
fn replay_under_another_configuration_is_drift() {
    let h = three_cycles();
    let mut other = h.config.clone();
    other.freshness_window_steps += 1;
    assert!(matches!(
        replay(&h.entries(), Arc::new(other)),
        Err(ReplayError::ConfigDrift { .. })
    ));
}

/// Cut the log at `index` and re-seal a cycle-1 collapse there.
fn collapse_diverges(
    entries: &[AuditEntry],
    index: usize,
    collapse: CollapseReason,
    config: &KernelConfig,
) {
    let forged = reseal(&entries[..=index], index, AuditEvent::Collapsed { cycle: 1, collapse });
    verify_entries(&forged).unwrap();
    match replay(&forged, Arc::new(config.clone())) {
        Err(ReplayError::Divergence(d)) => {
            assert_eq!(d.cycle, 1);
            assert_eq!(d.entry_index, index as u64);
            assert_eq!(d.kind, DivergenceKind::CollapseRecord);
        }
        other => panic!("expected divergence, got {other:?}"),
    }
}

#[test]
fn budget_collapse_that_never_happened_is_rejected() {
    let h = three_cycles();
    let entries = h.entries();
    let limit = h.config.step_budget.max_iterations;
    let limit_ms = h.config.step_budget.max_wall_clock_ms;

    // Right after step_started nothing has been charged to the budget.
    for collapse in [
        CollapseReason::IterationBudget { limit: 7 },
        CollapseReason::IterationBudget { limit },
        CollapseReason::WallClockBudget { limit_ms: limit_ms + 1 },
    ] {
        collapse_diverges(&entries, 2, collapse, &h.config);
    }
}

#[test]
fn iteration_collapse_must_land_on_the_overrunning_tick() {
    let mut cfg = config();
    cfg.step_budget.max_iterations = 2;
    let mut h = Harness::with_config(cfg);
    let err = h
        .kernel
        .step(&[b"[]".to_vec(), b"{}".to_vec(), b"7".to_vec()])
        .unwrap_err();
    assert!(matches!(
        err,
        KernelError::Collapse(CollapseReason::IterationBudget { limit: 2 })
    ));
    let entries = h.entries();
    assert_eq!(entries.len(), 7);
    let report = replay(&entries, Arc::new(h.config.clone())).unwrap();
    assert_eq!(report.collapsed, Some(CollapseReason::IterationBudget { limit: 2 }));

    // Moved one bundle earlier, the same collapse is a forgery.
    collapse_diverges(&entries, 4, CollapseReason::IterationBudget { limit: 2 }, &h.config);
}
