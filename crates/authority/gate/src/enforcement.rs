use authority_law::{ConsumptionRegistry, LawState};
use authority_types::{EnforcementRefusal, Warrant};

/// Post-justification gate.
///
/// Re-validates a warrant against law-state as it is *now*, not as it was
/// at issuance. A claim valid at classification but since revoked, consumed
/// or expired is refused here.
pub struct EnforcementGate;

impl EnforcementGate {
    /// Pure check, in fixed order. Mutates nothing.
    pub fn check(
        warrant: &Warrant,
        law: &LawState,
        registry: &ConsumptionRegistry,
        cycle: u64,
    ) -> Result<(), EnforcementRefusal> {
        let payload = &warrant.payload;

        if registry.is_warrant_consumed(&warrant.warrant_id) {
            return Err(EnforcementRefusal::DuplicateWarrant);
        }
        if registry.is_claim_consumed(&payload.claim_id) {
            return Err(EnforcementRefusal::Consumed);
        }

        let mut revoked = law.is_signer_revoked(&payload.actor);
        if let Some(delegation) = &payload.delegation {
            revoked |= law.is_signer_revoked(&delegation.root_signer_id)
                || law.is_delegation_revoked(&delegation.delegation_id);
        }
        if revoked {
            return Err(EnforcementRefusal::RevokedActor);
        }

        if payload.epoch != law.epoch() || cycle < payload.issued_step || cycle > payload.expires_step
        {
            return Err(EnforcementRefusal::OutsideValidWindow);
        }

        let namespace = payload.scope.namespace();
        if registry.executions_in(cycle, namespace) >= payload.rate_limit {
            return Err(EnforcementRefusal::RateLimited);
        }
        Ok(())
    }
}
