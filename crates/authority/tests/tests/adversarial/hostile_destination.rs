//! On restart the destination is checked against the log. Effects the log
//! can account for are reconciled; anything else collapses the run.

use std::sync::Arc;

use authority_audit::{verify_file, AuditEvent, AuditLog, CollapseReason, FileAuditLog};
use authority_canonical::hash_bytes;
use authority_gate::{EffectSink, FileDestination};
use authority_kernel::{AgentView, Kernel, KernelError};
use authority_replay::replay_file;
use authority_tests::{config, direct, scope};
use authority_types::{ActionRequest, ClaimType, Effect, Warrant};
use tempfile::TempDir;

struct Paths {
    _dir: TempDir,
    log: std::path::PathBuf,
    effects: std::path::PathBuf,
}

fn paths() -> Paths {
    let dir = TempDir::new().unwrap();
    Paths {
        log: dir.path().join("audit.jsonl"),
        effects: dir.path().join("effects.jsonl"),
        _dir: dir,
    }
}

fn open(p: &Paths) -> Result<Kernel, KernelError> {
    Kernel::open(
        config(),
        Arc::new(FileAuditLog::open(&p.log).unwrap()),
        Arc::new(FileDestination::new(&p.effects).unwrap()),
    )
}

#[test]
fn forged_effect_collapses_on_restart() {
    let p = paths();
    open(&p).unwrap().step(&[direct("c-1", 1)]).unwrap();

    FileDestination::new(&p.effects)
        .unwrap()
        .apply(&Effect {
            warrant_id: hash_bytes(b"never issued"),
            claim_id: "ghost".into(),
            claim_type: ClaimType::Command,
            scope: scope("ops/restart"),
            action: ActionRequest::new("restart", "ghost"),
            cycle: 1,
        })
        .unwrap();

    assert!(matches!(
        open(&p),
        Err(KernelError::Collapse(CollapseReason::UnknownDestinationEffect { .. }))
    ));
    verify_file(&p.log).unwrap();
    let report = replay_file(&p.log, Arc::new(config())).unwrap();
    assert!(matches!(
        report.collapsed,
        Some(CollapseReason::UnknownDestinationEffect { .. })
    ));
    // Collapse is terminal.
    assert!(matches!(open(&p), Err(KernelError::Collapse(_))));
}

#[test]
fn effect_for_an_issued_warrant_is_reconciled_once() {
    let p = paths();
    let warrant: Warrant = {
        let mut kernel = open(&p)
            .unwrap()
            .with_selector(|_: &AgentView| Vec::new());
        kernel.step(&[direct("c-1", 1)]).unwrap();
        let log = FileAuditLog::open(&p.log).unwrap();
        log.entries()
            .unwrap()
            .into_iter()
            .find_map(|e| match e.event {
                AuditEvent::WarrantIssued { warrant } => Some(warrant),
                _ => None,
            })
            .unwrap()
    };

    // The effect landed but the process died before logging it.
    FileDestination::new(&p.effects)
        .unwrap()
        .apply(&Effect::for_warrant(&warrant, 1))
        .unwrap();

    let mut kernel = open(&p).unwrap();
    assert!(kernel.registry().is_claim_consumed("c-1"));
    assert_eq!(kernel.pending_warrants(), 0);
    let report = kernel.step(&[direct("c-1", 3)]).unwrap();
    assert_eq!((report.executed, report.denied), (0, 1));

    let entries = FileAuditLog::open(&p.log).unwrap().entries().unwrap();
    let reconciled = entries
        .iter()
        .filter(|e| matches!(e.event, AuditEvent::EffectReconciled { .. }))
        .count();
    assert_eq!(reconciled, 1);
    let replayed = replay_file(&p.log, Arc::new(config())).unwrap();
    assert_eq!(replayed.state_hashes, kernel.state_hashes());
}
