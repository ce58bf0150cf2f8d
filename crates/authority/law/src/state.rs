use std::collections::BTreeSet;

use authority_canonical::{hash_canonical, Sha256Hash};
use authority_types::{PolicyOp, SignerId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::KernelConfig;
use crate::error::LawError;

/// A single change to law-state, as recorded in the law stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum LawTransition {
    EpochAdvanced { from: u64, to: u64 },
    SignerRevoked { signer_id: SignerId },
    DelegationRevoked { delegation_id: String },
}

/// Current epoch and the permanent revocation sets.
///
/// Only [`LawState::advance_epoch`] and the revoke methods mutate it. There
/// is no way to lower the epoch or lift a revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawState {
    epoch: u64,
    revoked_signers: BTreeSet<SignerId>,
    revoked_delegations: BTreeSet<String>,
}

impl LawState {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            revoked_signers: BTreeSet::new(),
            revoked_delegations: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self {
            epoch: config.initial_epoch,
            revoked_signers: config.initial_revocations.signers.clone(),
            revoked_delegations: config.initial_revocations.delegations.clone(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_signer_revoked(&self, signer: &SignerId) -> bool {
        self.revoked_signers.contains(signer)
    }

    pub fn is_delegation_revoked(&self, delegation_id: &str) -> bool {
        self.revoked_delegations.contains(delegation_id)
    }

    pub fn advance_epoch(&mut self) -> LawTransition {
        let from = self.epoch;
        self.epoch += 1;
        debug!(from, to = self.epoch, "epoch advanced");
        LawTransition::EpochAdvanced { from, to: self.epoch }
    }

    pub fn revoke_signer(&mut self, signer: SignerId) -> LawTransition {
        debug!(signer = %signer, "signer revoked");
        self.revoked_signers.insert(signer.clone());
        LawTransition::SignerRevoked { signer_id: signer }
    }

    pub fn revoke_delegation(&mut self, delegation_id: String) -> LawTransition {
        debug!(delegation_id = %delegation_id, "delegation revoked");
        self.revoked_delegations.insert(delegation_id.clone());
        LawTransition::DelegationRevoked { delegation_id }
    }

    /// Apply the transition a policy op asks for.
    pub fn apply_policy(&mut self, op: &PolicyOp) -> LawTransition {
        match op {
            PolicyOp::AdvanceEpoch => self.advance_epoch(),
            PolicyOp::RevokeSigner { signer_id } => self.revoke_signer(signer_id.clone()),
            PolicyOp::RevokeDelegation { delegation_id } => {
                self.revoke_delegation(delegation_id.clone())
            }
        }
    }

    /// Re-apply a recorded transition, checking it against the current state.
    pub fn apply_transition(&mut self, transition: &LawTransition) -> Result<(), LawError> {
        match transition {
            LawTransition::EpochAdvanced { from, to } => {
                if *to <= self.epoch {
                    return Err(LawError::EpochRegression {
                        current: self.epoch,
                        requested: *to,
                    });
                }
                if *from != self.epoch || *to != self.epoch + 1 {
                    return Err(LawError::TransitionMismatch(format!(
                        "epoch {from}->{to} at epoch {}",
                        self.epoch
                    )));
                }
                self.advance_epoch();
            }
            LawTransition::SignerRevoked { signer_id } => {
                self.revoke_signer(signer_id.clone());
            }
            LawTransition::DelegationRevoked { delegation_id } => {
                self.revoke_delegation(delegation_id.clone());
            }
        }
        Ok(())
    }

    pub fn law_hash(&self) -> Result<Sha256Hash, LawError> {
        Ok(hash_canonical(self)?)
    }
}
