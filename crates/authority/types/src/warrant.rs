use std::fmt;

use authority_canonical::{hash_canonical, Sha256Hash};
use serde::{Deserialize, Serialize};

use crate::claim::{ActionRequest, ClaimType};
use crate::error::TypesError;
use crate::ids::{Scope, SignerId};

/// Delegation the warrant's authority rests on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRef {
    pub delegation_id: String,
    pub root_signer_id: SignerId,
}

/// Everything a warrant binds. The warrant id is the hash of this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantPayload {
    pub claim_hash: Sha256Hash,
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub scope: Scope,
    pub scope_hash: Sha256Hash,
    pub action: ActionRequest,
    pub action_hash: Sha256Hash,
    /// Epoch current when the claim was classified.
    pub epoch: u64,
    pub issued_step: u64,
    /// Last cycle in which the warrant may execute.
    pub expires_step: u64,
    /// Executions per cycle allowed in the scope's namespace.
    pub rate_limit: u32,
    pub actor: SignerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationRef>,
}

/// Single-use, content-derived authorization for one effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warrant {
    pub warrant_id: Sha256Hash,
    #[serde(flatten)]
    pub payload: WarrantPayload,
}

impl Warrant {
    pub fn from_payload(payload: WarrantPayload) -> Result<Self, TypesError> {
        let warrant_id = hash_canonical(&payload)?;
        Ok(Self {
            warrant_id,
            payload,
        })
    }

    /// Whether `warrant_id` still matches the payload.
    pub fn id_matches(&self) -> Result<bool, TypesError> {
        Ok(hash_canonical(&self.payload)? == self.warrant_id)
    }

    pub fn claim_id(&self) -> &str {
        &self.payload.claim_id
    }

    pub fn scope(&self) -> &Scope {
        &self.payload.scope
    }
}

/// Why the gate refused an otherwise warranted action at execution time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementRefusal {
    /// This warrant id was already consumed.
    DuplicateWarrant,
    /// Another warrant for the same claim was already consumed.
    Consumed,
    RevokedActor,
    OutsideValidWindow,
    RateLimited,
}

impl EnforcementRefusal {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateWarrant => "DUPLICATE_WARRANT",
            Self::Consumed => "CONSUMED",
            Self::RevokedActor => "REVOKED_ACTOR",
            Self::OutsideValidWindow => "OUTSIDE_VALID_WINDOW",
            Self::RateLimited => "RATE_LIMITED",
        }
    }
}

impl fmt::Display for EnforcementRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An effect applied at the destination. Keyed by warrant id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub warrant_id: Sha256Hash,
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub scope: Scope,
    pub action: ActionRequest,
    pub cycle: u64,
}

impl Effect {
    pub fn for_warrant(warrant: &Warrant, cycle: u64) -> Self {
        Self {
            warrant_id: warrant.warrant_id,
            claim_id: warrant.payload.claim_id.clone(),
            claim_type: warrant.payload.claim_type,
            scope: warrant.payload.scope.clone(),
            action: warrant.payload.action.clone(),
            cycle,
        }
    }
}
