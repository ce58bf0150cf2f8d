//! Partial provenance forgeries: every local check passes, a global one
//! does not, and nothing reaches the destination.

use authority_tests::{command, delegate, delegation, stranger, wire, Harness};
use authority_types::{Classification, InvalidReason, ProvenanceBundle};

fn refused_with(bundle: Vec<u8>, claim_id: &str, reason: InvalidReason) {
    let mut h = Harness::new();
    let report = h.kernel.step(&[bundle]).unwrap();

    assert_eq!((report.admitted, report.refused, report.executed), (0, 1, 0));
    assert_eq!(
        h.classifications_of(claim_id),
        vec![Classification::Invalid(reason)]
    );
    assert!(h.warrant_ids().is_empty());
    assert!(h.destination.is_empty());
}

#[test]
fn truncated_provenance_is_missing_delegation() {
    let mut claim = command("c-1", &delegate(), "ops/restart", 1);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&delegate()).unwrap();
    refused_with(
        wire(&ProvenanceBundle::direct(claim)),
        "c-1",
        InvalidReason::MissingDelegation,
    );
}

#[test]
fn scope_laundering_is_caught() {
    let mut claim = command("c-1", &delegate(), "ops/deploy", 1);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&delegate()).unwrap();
    let bundle = ProvenanceBundle::delegated(claim, delegation("d-1", &["ops/restart"], 0));
    refused_with(wire(&bundle), "c-1", InvalidReason::ScopeNotInDelegation);
}

#[test]
fn epoch_consistent_forgery_is_an_identity_mismatch() {
    // Current epoch everywhere, but the claim is signed by someone other
    // than the delegate the root named.
    let mut claim = command("c-1", &stranger(), "ops/restart", 1);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&stranger()).unwrap();
    let bundle = ProvenanceBundle::delegated(claim, delegation("d-1", &["ops/restart"], 0));
    refused_with(wire(&bundle), "c-1", InvalidReason::DelegateIdentityMismatch);
}

#[test]
fn stale_delegation_epoch_is_refused() {
    let mut claim = command("c-1", &delegate(), "ops/restart", 1);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&delegate()).unwrap();
    let bundle = ProvenanceBundle::delegated(claim, delegation("d-1", &["ops/restart"], 7));
    refused_with(wire(&bundle), "c-1", InvalidReason::EpochMismatch);
}

#[test]
fn tampered_delegation_scope_breaks_the_root_signature() {
    let mut claim = command("c-1", &delegate(), "ops/deploy", 1);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&delegate()).unwrap();
    let mut widened = delegation("d-1", &["ops/restart"], 0);
    widened.scope_set.insert(authority_tests::scope("ops/deploy"));
    let bundle = ProvenanceBundle::delegated(claim, widened);
    refused_with(wire(&bundle), "c-1", InvalidReason::SignatureInvalid);
}
