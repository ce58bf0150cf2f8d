use std::sync::Arc;

use authority_canonical::hash_canonical;
use authority_law::{KernelConfig, LawState};
use authority_types::{DelegationRef, ProvenanceBundle, Warrant, WarrantPayload};
use tracing::debug;

use crate::error::GateError;

/// Derives warrants from admitted bundles.
///
/// Deterministic: the same bundle, epoch and cycle always give the same
/// warrant id.
pub struct WarrantIssuer {
    config: Arc<KernelConfig>,
}

impl WarrantIssuer {
    pub fn new(config: Arc<KernelConfig>) -> Self {
        Self { config }
    }

    pub fn issue(
        &self,
        bundle: &ProvenanceBundle,
        law: &LawState,
        cycle: u64,
    ) -> Result<Warrant, GateError> {
        let claim = &bundle.claim;
        let payload = WarrantPayload {
            claim_hash: claim.claim_hash()?,
            claim_id: claim.claim_id.clone(),
            claim_type: claim.claim_type,
            scope: claim.scope.clone(),
            scope_hash: hash_canonical(&claim.scope)?,
            action: claim.action.clone(),
            action_hash: hash_canonical(&claim.action)?,
            epoch: law.epoch(),
            issued_step: cycle,
            expires_step: cycle.saturating_add(self.config.warrant_ttl_steps),
            rate_limit: self.config.rate_limit_for(claim.scope.namespace()),
            actor: claim.claimed_actor_id.clone(),
            delegation: bundle.delegation.as_ref().map(|d| DelegationRef {
                delegation_id: d.delegation_id.clone(),
                root_signer_id: d.root_signer_id.clone(),
            }),
        };
        let warrant = Warrant::from_payload(payload)?;
        debug!(
            warrant_id = %warrant.warrant_id,
            claim_id = %warrant.payload.claim_id,
            epoch = warrant.payload.epoch,
            expires_step = warrant.payload.expires_step,
            "warrant issued"
        );
        Ok(warrant)
    }
}
