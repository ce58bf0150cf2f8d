//! Shared fixtures for the cross-crate suites.
//!
//! One root signer, one delegate, and builders for the bundle shapes the
//! scenarios need. Everything is derived from fixed labels so two runs of
//! a scenario see byte-identical inputs.

use std::sync::Arc;

use authority_audit::{AuditEntry, AuditEvent, MemoryAuditLog};
use authority_canonical::Sha256Hash;
use authority_gate::MemoryDestination;
use authority_kernel::{Kernel, Selector};
use authority_law::KernelConfig;
use authority_types::{
    ActionRequest, AuthorityClaim, AuthorityKey, ClaimType, Classification, Delegation,
    LogicalTimestamp, PolicyOp, ProvenanceBundle, Scope,
};

pub const RUN_ID: &str = "scenario";

pub fn root() -> AuthorityKey {
    AuthorityKey::derive("root")
}

pub fn delegate() -> AuthorityKey {
    AuthorityKey::derive("delegate-a")
}

pub fn stranger() -> AuthorityKey {
    AuthorityKey::derive("stranger")
}

pub fn scope(text: &str) -> Scope {
    Scope::parse(text).expect("fixture scope")
}

pub fn config() -> KernelConfig {
    KernelConfig::new(RUN_ID, [root().signer_id()], ["ops"])
}

/// Delegation from the root to delegate A for `scopes` at `epoch`.
pub fn delegation(id: &str, scopes: &[&str], epoch: u64) -> Delegation {
    Delegation::builder(id, delegate().signer_id(), epoch)
        .scopes(scopes.iter().map(|s| scope(s)))
        .sign(&root())
        .expect("fixture delegation")
}

/// An unsigned command claim for `actor`, stamped at `cycle`.
pub fn command(claim_id: &str, actor: &AuthorityKey, scope_text: &str, cycle: u64) -> AuthorityClaim {
    AuthorityClaim::builder(
        claim_id,
        actor.signer_id(),
        scope(scope_text),
        ActionRequest::new("restart", claim_id),
    )
    .timestamp(LogicalTimestamp::new(RUN_ID, cycle, 0))
    .build()
}

pub fn wire(bundle: &ProvenanceBundle) -> Vec<u8> {
    bundle.to_wire().expect("fixture wire form").into_bytes()
}

/// A root-signed direct command.
pub fn direct(claim_id: &str, cycle: u64) -> Vec<u8> {
    let claim = command(claim_id, &root(), "ops/restart", cycle)
        .sign(&root())
        .expect("fixture signature");
    wire(&ProvenanceBundle::direct(claim))
}

/// Delegate A acting under `d-1` for `ops/restart` at epoch 0.
pub fn delegated(claim_id: &str, cycle: u64) -> Vec<u8> {
    let mut claim = command(claim_id, &delegate(), "ops/restart", cycle);
    claim.delegation_id = Some("d-1".into());
    claim.epoch = Some(0);
    let claim = claim.sign(&delegate()).expect("fixture signature");
    wire(&ProvenanceBundle::delegated(claim, delegation("d-1", &["ops/restart"], 0)))
}

/// A root-signed policy update carrying `op`.
pub fn policy(claim_id: &str, op: &PolicyOp, cycle: u64) -> Vec<u8> {
    let claim = AuthorityClaim::builder(
        claim_id,
        root().signer_id(),
        scope(op.required_scope()),
        op.to_action(),
    )
    .claim_type(ClaimType::PolicyUpdate)
    .timestamp(LogicalTimestamp::new(RUN_ID, cycle, 0))
    .build()
    .sign(&root())
    .expect("fixture signature");
    wire(&ProvenanceBundle::direct(claim))
}

/// A kernel over in-memory log and destination.
pub struct Harness {
    pub config: KernelConfig,
    pub log: Arc<MemoryAuditLog>,
    pub destination: MemoryDestination,
    pub kernel: Kernel,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let log = Arc::new(MemoryAuditLog::new());
        let destination = MemoryDestination::new();
        let kernel = Kernel::open(config.clone(), log.clone(), Arc::new(destination.clone()))
            .expect("fresh kernel");
        Self {
            config,
            log,
            destination,
            kernel,
        }
    }

    pub fn with_selector(self, selector: impl Selector + 'static) -> Self {
        let Self {
            config,
            log,
            destination,
            kernel,
        } = self;
        Self {
            kernel: kernel.with_selector(selector),
            config,
            log,
            destination,
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        use authority_audit::AuditLog;
        self.log.entries().expect("memory log")
    }

    /// Every logged classification for `claim_id`, in log order.
    pub fn classifications_of(&self, claim_id: &str) -> Vec<Classification> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e.event {
                AuditEvent::ClaimClassified {
                    claim_id: Some(id),
                    classification,
                    ..
                } if id == claim_id => Some(classification),
                _ => None,
            })
            .collect()
    }

    pub fn warrant_ids(&self) -> Vec<Sha256Hash> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e.event {
                AuditEvent::WarrantIssued { warrant } => Some(warrant.warrant_id),
                _ => None,
            })
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the event at `index` and re-seal every entry after it, so the
/// chain verifies and only recomputation can catch the edit.
pub fn reseal(entries: &[AuditEntry], index: usize, event: AuditEvent) -> Vec<AuditEntry> {
    let mut out: Vec<AuditEntry> = entries[..index].to_vec();
    for (i, entry) in entries.iter().enumerate().skip(index) {
        let event = if i == index { event.clone() } else { entry.event.clone() };
        let prev = out.last().map_or(Sha256Hash::ZERO, |e| e.entry_hash);
        out.push(AuditEntry::seal(i as u64, entry.timestamp.clone(), event, prev).expect("reseal"));
    }
    out
}
