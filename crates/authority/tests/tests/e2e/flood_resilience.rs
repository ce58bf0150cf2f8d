//! 500 bundles per step, 10% valid, 45% invalid, 45% malformed.

use std::collections::BTreeSet;
use std::sync::Arc;

use authority_replay::replay;
use authority_tests::{command, config, direct, root, stranger, wire, Harness};
use authority_types::ProvenanceBundle;

const PER_STEP: usize = 500;
const STEPS: u64 = 4;

fn invalid_pool() -> Vec<Vec<u8>> {
    let unknown_issuer = command("forged-issuer", &stranger(), "ops/restart", 1)
        .sign(&stranger())
        .unwrap();
    let mut bad_signature = command("forged-sig", &root(), "ops/restart", 1)
        .sign(&root())
        .unwrap();
    bad_signature.action.target = "elsewhere".into();
    let wrong_namespace = command("forged-ns", &root(), "finance/pay", 1)
        .sign(&root())
        .unwrap();
    [unknown_issuer, bad_signature, wrong_namespace]
        .into_iter()
        .map(|c| wire(&ProvenanceBundle::direct(c)))
        .collect()
}

fn malformed_pool() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        b"[]".to_vec(),
        b"{}".to_vec(),
        vec![0xff, 0xfe, 0x00],
        b"{\"claim\":5}".to_vec(),
    ]
}

fn batch(cycle: u64, invalid: &[Vec<u8>], malformed: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let valid = PER_STEP / 10;
    let rest = (PER_STEP - valid) / 2;
    let mut out = Vec::with_capacity(PER_STEP);
    out.extend((0..valid).map(|i| direct(&format!("valid-{cycle}-{i}"), cycle)));
    out.extend((0..rest).map(|i| invalid[i % invalid.len()].clone()));
    out.extend((0..rest).map(|i| malformed[i % malformed.len()].clone()));
    out
}

#[test]
fn flood_yields_every_valid_effect_and_nothing_else() {
    let mut cfg = config();
    cfg.step_budget.max_wall_clock_ms = 60_000;
    let mut h = Harness::with_config(cfg);
    let (invalid, malformed) = (invalid_pool(), malformed_pool());

    for cycle in 1..=STEPS {
        let report = h.kernel.step(&batch(cycle, &invalid, &malformed)).unwrap();
        assert_eq!(report.received, PER_STEP);
        assert_eq!(report.admitted, PER_STEP / 10);
        assert_eq!(report.executed, PER_STEP / 10);
        assert_eq!(report.refused, PER_STEP - PER_STEP / 10);
    }
    assert!(h.kernel.collapsed().is_none());

    let effects = h.destination.snapshot();
    let claims: BTreeSet<_> = effects.iter().map(|e| e.claim_id.clone()).collect();
    assert_eq!(effects.len(), claims.len());
    assert_eq!(claims.len(), STEPS as usize * PER_STEP / 10);
    assert!(claims.iter().all(|id| id.starts_with("valid-")));

    let report = replay(&h.entries(), Arc::new(h.config.clone())).unwrap();
    assert_eq!(report.state_hashes, h.kernel.state_hashes());
}
