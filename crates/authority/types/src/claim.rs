use std::collections::BTreeMap;

use authority_canonical::{canonical_json, hash_canonical, Sha256Hash};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::ids::{Scope, SignerId};
use crate::signing::AuthorityKey;

/// Domain prefix for claim signatures.
pub const CLAIM_SIGNING_DOMAIN: &[u8] = b"authority-claim/v1:";

/// What a claim asks the kernel to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    /// Apply an effect at the destination.
    Command,
    /// Transition law-state (epoch advance, revocation).
    PolicyUpdate,
}

impl ClaimType {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "COMMAND" => Some(Self::Command),
            "POLICY_UPDATE" => Some(Self::PolicyUpdate),
            _ => None,
        }
    }
}

/// Logical time of a claim. Never wall-clock.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalTimestamp {
    pub run_id: String,
    pub step: u64,
    pub index: u64,
}

impl LogicalTimestamp {
    pub fn new(run_id: impl Into<String>, step: u64, index: u64) -> Self {
        Self {
            run_id: run_id.into(),
            step,
            index,
        }
    }
}

/// The requested effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub op: String,
    pub target: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl ActionRequest {
    pub fn new(op: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            target: target.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Law transition carried by a `POLICY_UPDATE` claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PolicyOp {
    AdvanceEpoch,
    RevokeSigner { signer_id: SignerId },
    RevokeDelegation { delegation_id: String },
}

impl PolicyOp {
    pub fn from_action(action: &ActionRequest) -> Option<Self> {
        match action.op.as_str() {
            "advance_epoch" => Some(Self::AdvanceEpoch),
            "revoke_signer" => SignerId::parse(&action.target)
                .ok()
                .map(|signer_id| Self::RevokeSigner { signer_id }),
            "revoke_delegation" if !action.target.is_empty() => Some(Self::RevokeDelegation {
                delegation_id: action.target.clone(),
            }),
            _ => None,
        }
    }

    /// The only scope under which this op may be authorized.
    pub fn required_scope(&self) -> &'static str {
        match self {
            Self::AdvanceEpoch => "law/epoch",
            Self::RevokeSigner { .. } | Self::RevokeDelegation { .. } => "law/revocation",
        }
    }

    pub fn to_action(&self) -> ActionRequest {
        match self {
            Self::AdvanceEpoch => ActionRequest::new("advance_epoch", ""),
            Self::RevokeSigner { signer_id } => {
                ActionRequest::new("revoke_signer", signer_id.as_str())
            }
            Self::RevokeDelegation { delegation_id } => {
                ActionRequest::new("revoke_delegation", delegation_id.clone())
            }
        }
    }
}

/// Signature envelope attached to a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureArtifact {
    pub signer_id: SignerId,
    /// Lowercase hex of the 64-byte ed25519 signature.
    pub signature: String,
}

/// An explicit, typed assertion of authority to cause an effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityClaim {
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub claimed_actor_id: SignerId,
    pub scope: Scope,
    pub action: ActionRequest,
    pub nonce: String,
    pub source_id: String,
    pub timestamp: LogicalTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<SignatureArtifact>,
}

impl AuthorityClaim {
    pub fn builder(
        claim_id: impl Into<String>,
        actor: SignerId,
        scope: Scope,
        action: ActionRequest,
    ) -> ClaimBuilder {
        ClaimBuilder::new(claim_id, actor, scope, action)
    }

    pub fn signer_id(&self) -> Option<&SignerId> {
        self.artifact.as_ref().map(|a| &a.signer_id)
    }

    /// Bytes covered by the claim signature: everything but the artifact.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypesError> {
        let mut unsigned = self.clone();
        unsigned.artifact = None;
        let mut message = CLAIM_SIGNING_DOMAIN.to_vec();
        message.extend_from_slice(&canonical_json(&unsigned)?);
        Ok(message)
    }

    /// Content hash of the full claim, artifact included.
    pub fn claim_hash(&self) -> Result<Sha256Hash, TypesError> {
        Ok(hash_canonical(self)?)
    }

    pub fn sign(mut self, key: &AuthorityKey) -> Result<Self, TypesError> {
        self.artifact = None;
        let signature = key.sign(&self.signing_bytes()?);
        self.artifact = Some(SignatureArtifact {
            signer_id: key.signer_id(),
            signature,
        });
        Ok(self)
    }
}

/// Builder for [`AuthorityClaim`]s.
pub struct ClaimBuilder {
    claim: AuthorityClaim,
}

impl ClaimBuilder {
    pub fn new(
        claim_id: impl Into<String>,
        actor: SignerId,
        scope: Scope,
        action: ActionRequest,
    ) -> Self {
        let claim_id = claim_id.into();
        Self {
            claim: AuthorityClaim {
                nonce: claim_id.clone(),
                claim_id,
                claim_type: ClaimType::Command,
                claimed_actor_id: actor,
                scope,
                action,
                source_id: "feed".into(),
                timestamp: LogicalTimestamp::new("run", 0, 0),
                delegation_id: None,
                epoch: None,
                artifact: None,
            },
        }
    }

    pub fn claim_type(mut self, claim_type: ClaimType) -> Self {
        self.claim.claim_type = claim_type;
        self
    }

    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.claim.nonce = nonce.into();
        self
    }

    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.claim.source_id = source_id.into();
        self
    }

    pub fn timestamp(mut self, timestamp: LogicalTimestamp) -> Self {
        self.claim.timestamp = timestamp;
        self
    }

    pub fn delegation(mut self, delegation_id: impl Into<String>) -> Self {
        self.claim.delegation_id = Some(delegation_id.into());
        self
    }

    pub fn epoch(mut self, epoch: u64) -> Self {
        self.claim.epoch = Some(epoch);
        self
    }

    pub fn build(self) -> AuthorityClaim {
        self.claim
    }
}
