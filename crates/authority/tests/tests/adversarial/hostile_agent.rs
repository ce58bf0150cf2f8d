//! The agent layer only ever sees warrants, and can only pick from them.

use std::sync::Arc;

use authority_audit::CollapseReason;
use authority_kernel::{AgentView, KernelError};
use authority_tests::{direct, Harness};
use parking_lot::Mutex;

fn assert_unauthorized(err: KernelError) {
    assert!(matches!(
        err,
        KernelError::Collapse(CollapseReason::UnauthorizedSelection { .. })
    ));
}

#[test]
fn selecting_a_refusal_token_collapses() {
    let mut h = Harness::new()
        .with_selector(|view: &AgentView| view.refusals.iter().map(|t| t.0).collect());

    let err = h.kernel.step(&[direct("c-1", 1), b"[]".to_vec()]).unwrap_err();
    assert_unauthorized(err);
    assert!(h.destination.is_empty());
}

#[test]
fn expired_warrant_cannot_be_selected_later() {
    let mut hoarded = Vec::new();
    let mut h = Harness::new().with_selector(move |view: &AgentView| {
        // Hold every warrant back, then try to spend them all at once.
        hoarded.extend(view.actions.iter().map(|a| a.warrant_id));
        if view.cycle < 5 {
            Vec::new()
        } else {
            hoarded.clone()
        }
    });

    h.kernel.step(&[direct("c-1", 1)]).unwrap();
    for _ in 2..5 {
        h.kernel.step(&[]).unwrap();
    }
    assert_unauthorized(h.kernel.step(&[]).unwrap_err());
    assert!(h.destination.is_empty());
}

#[test]
fn view_carries_only_warrants_and_opaque_tokens() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut h = Harness::new().with_selector(move |view: &AgentView| {
        sink.lock().push((view.actions.clone(), view.refusals.clone()));
        view.actions.iter().map(|a| a.warrant_id).collect()
    });

    h.kernel
        .step(&[direct("c-1", 1), b"{\"claim\":5}".to_vec(), b"[]".to_vec()])
        .unwrap();
    let views = seen.lock();
    let (actions, refusals) = &views[0];
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].claim_id, "c-1");
    assert_eq!(refusals.len(), 2);
    assert_eq!(h.destination.len(), 1);
}
