//! The boundary to the agent layer.

use authority_canonical::Sha256Hash;
use authority_gate::PendingWarrants;
use authority_types::{ActionRequest, RefusalToken, Scope};
use serde::Serialize;

/// One action the agent layer may choose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedAction {
    pub warrant_id: Sha256Hash,
    pub claim_id: String,
    pub scope: Scope,
    pub action: ActionRequest,
    /// Last cycle the warrant can execute in.
    pub expires_step: u64,
}

/// All the agent layer ever sees of a step.
///
/// Refused bundles appear only as opaque tokens: no claim content, reason
/// or signer crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentView {
    pub cycle: u64,
    pub actions: Vec<AuthorizedAction>,
    pub refusals: Vec<RefusalToken>,
}

impl AgentView {
    pub(crate) fn new(cycle: u64, pending: &PendingWarrants, refusals: Vec<RefusalToken>) -> Self {
        let actions = pending
            .iter()
            .map(|w| AuthorizedAction {
                warrant_id: w.warrant_id,
                claim_id: w.payload.claim_id.clone(),
                scope: w.payload.scope.clone(),
                action: w.payload.action.clone(),
                expires_step: w.payload.expires_step,
            })
            .collect();
        Self {
            cycle,
            actions,
            refusals,
        }
    }
}

/// Chooses which authorized actions to execute, in order.
///
/// Returning an id not in the view collapses the run.
pub trait Selector: Send {
    fn select(&mut self, view: &AgentView) -> Vec<Sha256Hash>;
}

/// Executes everything it is offered, in offer order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl Selector for SelectAll {
    fn select(&mut self, view: &AgentView) -> Vec<Sha256Hash> {
        view.actions.iter().map(|a| a.warrant_id).collect()
    }
}

impl<F> Selector for F
where
    F: FnMut(&AgentView) -> Vec<Sha256Hash> + Send,
{
    fn select(&mut self, view: &AgentView) -> Vec<Sha256Hash> {
        self(view)
    }
}
