use serde::{Deserialize, Serialize};

use crate::claim::AuthorityClaim;
use crate::delegation::Delegation;
use crate::error::TypesError;

/// The unit presented at ingress: a claim and, for delegated authority, the
/// delegation it rests on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceBundle {
    pub claim: AuthorityClaim,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
}

impl ProvenanceBundle {
    pub fn direct(claim: AuthorityClaim) -> Self {
        Self {
            claim,
            delegation: None,
        }
    }

    pub fn delegated(claim: AuthorityClaim, delegation: Delegation) -> Self {
        Self {
            claim,
            delegation: Some(delegation),
        }
    }

    /// Wire form presented at ingress.
    pub fn to_wire(&self) -> Result<String, TypesError> {
        Ok(serde_json::to_string(self)?)
    }
}
