use std::collections::BTreeSet;

use authority_canonical::canonical_json;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::ids::{Scope, SignerId};
use crate::signing::AuthorityKey;

/// Domain prefix for delegation signatures.
pub const DELEGATION_SIGNING_DOMAIN: &[u8] = b"authority-delegation/v1:";

/// A root signer's grant of a scope set to a delegate for one epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegation_id: String,
    pub root_signer_id: SignerId,
    pub delegate_signer_id: SignerId,
    pub epoch: u64,
    pub scope_set: BTreeSet<Scope>,
    /// Root's signature over every other field.
    pub signature: String,
}

#[derive(Serialize)]
struct DelegationPayload<'a> {
    delegation_id: &'a str,
    root_signer_id: &'a SignerId,
    delegate_signer_id: &'a SignerId,
    epoch: u64,
    scope_set: &'a BTreeSet<Scope>,
}

impl Delegation {
    pub fn builder(
        delegation_id: impl Into<String>,
        delegate: SignerId,
        epoch: u64,
    ) -> DelegationBuilder {
        DelegationBuilder::new(delegation_id, delegate, epoch)
    }

    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypesError> {
        let payload = DelegationPayload {
            delegation_id: &self.delegation_id,
            root_signer_id: &self.root_signer_id,
            delegate_signer_id: &self.delegate_signer_id,
            epoch: self.epoch,
            scope_set: &self.scope_set,
        };
        let mut message = DELEGATION_SIGNING_DOMAIN.to_vec();
        message.extend_from_slice(&canonical_json(&payload)?);
        Ok(message)
    }

    pub fn covers(&self, scope: &Scope) -> bool {
        self.scope_set.contains(scope)
    }
}

pub struct DelegationBuilder {
    delegation_id: String,
    delegate: SignerId,
    epoch: u64,
    scope_set: BTreeSet<Scope>,
}

impl DelegationBuilder {
    pub fn new(delegation_id: impl Into<String>, delegate: SignerId, epoch: u64) -> Self {
        Self {
            delegation_id: delegation_id.into(),
            delegate,
            epoch,
            scope_set: BTreeSet::new(),
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope_set.insert(scope);
        self
    }

    pub fn scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scope_set.extend(scopes);
        self
    }

    /// Sign as `root`, producing the finished delegation.
    pub fn sign(self, root: &AuthorityKey) -> Result<Delegation, TypesError> {
        let mut delegation = Delegation {
            delegation_id: self.delegation_id,
            root_signer_id: root.signer_id(),
            delegate_signer_id: self.delegate,
            epoch: self.epoch,
            scope_set: self.scope_set,
            signature: String::new(),
        };
        delegation.signature = root.sign(&delegation.signing_bytes()?);
        Ok(delegation)
    }
}
