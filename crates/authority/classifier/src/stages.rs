use authority_law::{KernelConfig, LawState};
use authority_types::{
    verify_signature, ClaimType, InvalidReason, PolicyOp, ProvenanceBundle,
};

use crate::provenance::ProvenanceValidator;

/// What a stage may look at: a decoded bundle and a law-state snapshot.
pub struct CheckContext<'a> {
    pub bundle: &'a ProvenanceBundle,
    pub config: &'a KernelConfig,
    pub law: &'a LawState,
    /// Cycle in which the bundle is classified.
    pub cycle: u64,
}

/// One authorization check. Stages run in `stage_number` order and the first
/// failure decides the outcome.
pub trait CheckStage: Send + Sync {
    fn stage_name(&self) -> &'static str;

    fn stage_number(&self) -> u8;

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason>;
}

/// The fixed stage list, in order.
pub fn default_stages() -> Vec<Box<dyn CheckStage>> {
    vec![
        Box::new(SignatureStage),
        Box::new(IssuerTrustStage),
        Box::new(ScopeStage),
        Box::new(FreshnessStage),
        Box::new(RevocationStage),
    ]
}

/// Stage 4: the claim signature (and the delegation signature, if carried).
pub struct SignatureStage;

impl CheckStage for SignatureStage {
    fn stage_name(&self) -> &'static str {
        "signature"
    }

    fn stage_number(&self) -> u8 {
        4
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason> {
        let claim = &ctx.bundle.claim;
        let artifact = claim
            .artifact
            .as_ref()
            .ok_or(InvalidReason::SignatureInvalid)?;
        if artifact.signer_id != claim.claimed_actor_id {
            return Err(InvalidReason::SignatureInvalid);
        }
        let message = claim
            .signing_bytes()
            .map_err(|_| InvalidReason::SignatureInvalid)?;
        if !verify_signature(&artifact.signer_id, &message, &artifact.signature) {
            return Err(InvalidReason::SignatureInvalid);
        }
        if let Some(delegation) = &ctx.bundle.delegation {
            ProvenanceValidator::signature(delegation)?;
        }
        Ok(())
    }
}

/// Stage 5: the signer is someone the configuration trusts.
pub struct IssuerTrustStage;

impl CheckStage for IssuerTrustStage {
    fn stage_name(&self) -> &'static str {
        "issuer_trust"
    }

    fn stage_number(&self) -> u8 {
        5
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason> {
        if ProvenanceValidator::is_delegated(ctx.bundle) {
            return ProvenanceValidator::ancestry(ctx.bundle, ctx.config).map(|_| ());
        }
        let signer = &ctx.bundle.claim.claimed_actor_id;
        if ctx.config.is_trusted_root(signer) || ctx.config.is_registered_actor(signer) {
            Ok(())
        } else {
            Err(InvalidReason::IssuerUnknown)
        }
    }
}

/// Stage 6: known namespace, law scopes only for policy updates, and the
/// scope is actually granted.
pub struct ScopeStage;

impl CheckStage for ScopeStage {
    fn stage_name(&self) -> &'static str {
        "scope"
    }

    fn stage_number(&self) -> u8 {
        6
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason> {
        let claim = &ctx.bundle.claim;
        if !ctx.config.is_known_namespace(claim.scope.namespace()) {
            return Err(InvalidReason::ScopeMismatch);
        }
        match claim.claim_type {
            ClaimType::Command if claim.scope.is_law() => {
                return Err(InvalidReason::ScopeMismatch);
            }
            ClaimType::Command => {}
            ClaimType::PolicyUpdate => {
                let op = PolicyOp::from_action(&claim.action).ok_or(InvalidReason::ScopeMismatch)?;
                if op.required_scope() != claim.scope.as_str() {
                    return Err(InvalidReason::ScopeMismatch);
                }
            }
        }
        match &ctx.bundle.delegation {
            // Issuer trust already bound the delegation to this claim.
            Some(delegation) => ProvenanceValidator::scope(delegation, claim),
            None if ctx.config.grants_scope(&claim.claimed_actor_id, &claim.scope) => Ok(()),
            None => Err(InvalidReason::ScopeMismatch),
        }
    }
}

/// Stage 7: logical timestamp inside the freshness window, epoch current.
pub struct FreshnessStage;

impl CheckStage for FreshnessStage {
    fn stage_name(&self) -> &'static str {
        "freshness"
    }

    fn stage_number(&self) -> u8 {
        7
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason> {
        let claim = &ctx.bundle.claim;
        let ts = &claim.timestamp;
        if ts.run_id != ctx.config.run_id {
            return Err(InvalidReason::ExpiredCredential);
        }
        if ts.step > ctx.cycle {
            return Err(InvalidReason::NotYetValid);
        }
        if ctx.cycle - ts.step > ctx.config.freshness_window_steps {
            return Err(InvalidReason::ExpiredCredential);
        }
        if let Some(delegation) = &ctx.bundle.delegation {
            return ProvenanceValidator::epoch(delegation, claim, ctx.law);
        }
        match claim.epoch {
            Some(epoch) if epoch < ctx.law.epoch() => Err(InvalidReason::ExpiredCredential),
            Some(epoch) if epoch > ctx.law.epoch() => Err(InvalidReason::EpochMismatch),
            _ => Ok(()),
        }
    }
}

/// Stage 8: nothing in the chain of authority is revoked.
pub struct RevocationStage;

impl CheckStage for RevocationStage {
    fn stage_name(&self) -> &'static str {
        "revocation"
    }

    fn stage_number(&self) -> u8 {
        8
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<(), InvalidReason> {
        if ctx.law.is_signer_revoked(&ctx.bundle.claim.claimed_actor_id) {
            return Err(InvalidReason::RevokedCredential);
        }
        match &ctx.bundle.delegation {
            Some(delegation) => ProvenanceValidator::revocation(delegation, ctx.law),
            None => Ok(()),
        }
    }
}
