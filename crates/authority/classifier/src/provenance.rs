use authority_law::{KernelConfig, LawState};
use authority_types::{
    verify_signature, AuthorityClaim, Delegation, InvalidReason, ProvenanceBundle,
};

/// Rules for claims that rest on a delegation.
///
/// A delegated claim is `VALID` only with single-root coherence, complete
/// ancestry in the same bundle, identity binding, scope coverage, epoch
/// consistency and no revocation. Each rule runs inside the stage of the
/// same name, so a delegated bundle still reports the first failure in the
/// global check order.
pub struct ProvenanceValidator;

impl ProvenanceValidator {
    /// Whether the bundle takes the delegated path at all.
    pub fn is_delegated(bundle: &ProvenanceBundle) -> bool {
        bundle.claim.delegation_id.is_some() || bundle.delegation.is_some()
    }

    /// The root's signature over the delegation, scope set included.
    pub fn signature(delegation: &Delegation) -> Result<(), InvalidReason> {
        let message = delegation
            .signing_bytes()
            .map_err(|_| InvalidReason::SignatureInvalid)?;
        if verify_signature(&delegation.root_signer_id, &message, &delegation.signature) {
            Ok(())
        } else {
            Err(InvalidReason::SignatureInvalid)
        }
    }

    /// Ancestry completeness, identity binding and root trust.
    pub fn ancestry<'b>(
        bundle: &'b ProvenanceBundle,
        config: &KernelConfig,
    ) -> Result<&'b Delegation, InvalidReason> {
        let claim = &bundle.claim;
        let delegation = match (&claim.delegation_id, &bundle.delegation) {
            (Some(_), None) => return Err(InvalidReason::MissingDelegation),
            (None, Some(_)) => return Err(InvalidReason::DelegationIdMismatch),
            (None, None) => return Err(InvalidReason::MissingDelegation),
            (Some(id), Some(d)) if *id != d.delegation_id => {
                return Err(InvalidReason::MissingDelegation)
            }
            (Some(_), Some(d)) => d,
        };
        if !config.is_trusted_root(&delegation.root_signer_id) {
            return Err(InvalidReason::UntrustedRoot);
        }
        if delegation.delegate_signer_id != claim.claimed_actor_id {
            return Err(InvalidReason::DelegateIdentityMismatch);
        }
        Ok(delegation)
    }

    pub fn scope(delegation: &Delegation, claim: &AuthorityClaim) -> Result<(), InvalidReason> {
        if delegation.covers(&claim.scope) {
            Ok(())
        } else {
            Err(InvalidReason::ScopeNotInDelegation)
        }
    }

    /// `delegation.epoch == claim.epoch == current_epoch`.
    pub fn epoch(
        delegation: &Delegation,
        claim: &AuthorityClaim,
        law: &LawState,
    ) -> Result<(), InvalidReason> {
        match claim.epoch {
            Some(epoch) if epoch == delegation.epoch && epoch == law.epoch() => Ok(()),
            _ => Err(InvalidReason::EpochMismatch),
        }
    }

    /// Neither the root, the delegate nor the delegation itself is revoked.
    pub fn revocation(delegation: &Delegation, law: &LawState) -> Result<(), InvalidReason> {
        let revoked = law.is_signer_revoked(&delegation.root_signer_id)
            || law.is_signer_revoked(&delegation.delegate_signer_id)
            || law.is_delegation_revoked(&delegation.delegation_id);
        if revoked {
            Err(InvalidReason::RevokedCredential)
        } else {
            Ok(())
        }
    }
}
