//! Audit entry types.

use std::fmt;

use authority_canonical::{hash_canonical, Sha256Hash};
use authority_law::LawTransition;
use authority_types::{
    Classification, Effect, EnforcementRefusal, LogicalTimestamp, RefusalToken, Warrant,
};
use serde::{Deserialize, Serialize};

use crate::chain::StreamHashes;
use crate::error::AuditError;

/// The per-cycle record streams folded into the state hash, in fold order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Ingress,
    Admission,
    Selector,
    Execution,
    Law,
}

impl Stream {
    pub const ALL: [Stream; 5] = [
        Stream::Ingress,
        Stream::Admission,
        Stream::Selector,
        Stream::Execution,
        Stream::Law,
    ];
}

/// Why a run collapsed. Collapse is terminal and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case", deny_unknown_fields)]
pub enum CollapseReason {
    IterationBudget { limit: u64 },
    WallClockBudget { limit_ms: u64 },
    /// The agent layer selected a warrant it was never shown.
    UnauthorizedSelection { warrant_id: Sha256Hash },
    /// The destination holds an effect no logged warrant accounts for.
    UnknownDestinationEffect { warrant_id: Sha256Hash },
    /// A VALID claim could not be turned into a warrant.
    IssuanceFailed { claim_id: String, error: String },
    /// The destination rejected an authorized effect.
    ExecutionFailed { warrant_id: Sha256Hash, error: String },
}

impl fmt::Display for CollapseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationBudget { limit } => write!(f, "iteration budget of {limit} exceeded"),
            Self::WallClockBudget { limit_ms } => {
                write!(f, "wall-clock budget of {limit_ms}ms exceeded")
            }
            Self::UnauthorizedSelection { warrant_id } => {
                write!(f, "agent selected unauthorized warrant {warrant_id}")
            }
            Self::UnknownDestinationEffect { warrant_id } => {
                write!(f, "destination holds effect for unknown warrant {warrant_id}")
            }
            Self::IssuanceFailed { claim_id, error } => {
                write!(f, "warrant issuance failed for claim {claim_id}: {error}")
            }
            Self::ExecutionFailed { warrant_id, error } => {
                write!(f, "effect for warrant {warrant_id} failed: {error}")
            }
        }
    }
}

/// The closed decision attached to every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Record,
    Admit,
    Refuse,
    Execute,
    Deny,
    Halt,
}

/// What an entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum AuditEvent {
    /// First entry of every log.
    RunStarted {
        run_id: String,
        schema_version: String,
        config_hash: Sha256Hash,
        root_identity: Sha256Hash,
        seed: u64,
    },
    StepStarted {
        cycle: u64,
    },
    /// Raw ingress bytes, logged before classification.
    BundleReceived {
        position: u64,
        raw_hex: String,
        bundle_hash: Sha256Hash,
    },
    ClaimClassified {
        position: u64,
        bundle_hash: Sha256Hash,
        claim_id: Option<String>,
        classification: Classification,
        refusal_token: Option<RefusalToken>,
    },
    WarrantIssued {
        warrant: Warrant,
    },
    /// Warrant ids the agent layer chose to execute, in execution order.
    ActionsSelected {
        warrant_ids: Vec<Sha256Hash>,
    },
    EffectExecuted {
        effect: Effect,
    },
    EnforcementRefused {
        warrant_id: Sha256Hash,
        claim_id: String,
        refusal: EnforcementRefusal,
    },
    /// An effect found at the destination on restart without a log entry.
    EffectReconciled {
        effect: Effect,
    },
    LawChanged {
        transition: LawTransition,
    },
    StepCommitted {
        cycle: u64,
        stream_hashes: StreamHashes,
        state_hash: Sha256Hash,
    },
    RecoveryStarted {
        cycle: u64,
        entries_replayed: u64,
    },
    Collapsed {
        cycle: u64,
        collapse: CollapseReason,
    },
}

impl AuditEvent {
    /// The serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StepStarted { .. } => "step_started",
            Self::BundleReceived { .. } => "bundle_received",
            Self::ClaimClassified { .. } => "claim_classified",
            Self::WarrantIssued { .. } => "warrant_issued",
            Self::ActionsSelected { .. } => "actions_selected",
            Self::EffectExecuted { .. } => "effect_executed",
            Self::EnforcementRefused { .. } => "enforcement_refused",
            Self::EffectReconciled { .. } => "effect_reconciled",
            Self::LawChanged { .. } => "law_changed",
            Self::StepCommitted { .. } => "step_committed",
            Self::RecoveryStarted { .. } => "recovery_started",
            Self::Collapsed { .. } => "collapsed",
        }
    }

    /// The stream this event is a record of. Control events have none.
    pub fn stream(&self) -> Option<Stream> {
        match self {
            Self::BundleReceived { .. } | Self::ClaimClassified { .. } => Some(Stream::Ingress),
            Self::WarrantIssued { .. } => Some(Stream::Admission),
            Self::ActionsSelected { .. } => Some(Stream::Selector),
            Self::EffectExecuted { .. }
            | Self::EnforcementRefused { .. }
            | Self::EffectReconciled { .. } => Some(Stream::Execution),
            Self::LawChanged { .. } => Some(Stream::Law),
            Self::RunStarted { .. }
            | Self::StepStarted { .. }
            | Self::StepCommitted { .. }
            | Self::RecoveryStarted { .. }
            | Self::Collapsed { .. } => None,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            Self::ClaimClassified { classification, .. } if classification.is_valid() => {
                Decision::Admit
            }
            Self::ClaimClassified { .. } => Decision::Refuse,
            Self::EffectExecuted { .. } | Self::EffectReconciled { .. } => Decision::Execute,
            Self::EnforcementRefused { .. } => Decision::Deny,
            Self::Collapsed { .. } => Decision::Halt,
            _ => Decision::Record,
        }
    }

    pub fn classification(&self) -> Option<Classification> {
        match self {
            Self::ClaimClassified { classification, .. } => Some(classification.clone()),
            _ => None,
        }
    }

    /// Content hashes this entry vouches for.
    pub fn witnesses(&self) -> Vec<Sha256Hash> {
        match self {
            Self::RunStarted {
                config_hash,
                root_identity,
                ..
            } => vec![*config_hash, *root_identity],
            Self::BundleReceived { bundle_hash, .. } => vec![*bundle_hash],
            Self::ClaimClassified {
                bundle_hash,
                refusal_token,
                ..
            } => {
                let mut w = vec![*bundle_hash];
                w.extend(refusal_token.map(|t| t.0));
                w
            }
            Self::WarrantIssued { warrant } => vec![warrant.payload.claim_hash, warrant.warrant_id],
            Self::ActionsSelected { warrant_ids } => warrant_ids.clone(),
            Self::EffectExecuted { effect } | Self::EffectReconciled { effect } => {
                vec![effect.warrant_id]
            }
            Self::EnforcementRefused { warrant_id, .. } => vec![*warrant_id],
            Self::StepCommitted { state_hash, .. } => vec![*state_hash],
            Self::Collapsed {
                collapse:
                    CollapseReason::UnauthorizedSelection { warrant_id }
                    | CollapseReason::UnknownDestinationEffect { warrant_id }
                    | CollapseReason::ExecutionFailed { warrant_id, .. },
                ..
            } => vec![*warrant_id],
            Self::StepStarted { .. }
            | Self::LawChanged { .. }
            | Self::RecoveryStarted { .. }
            | Self::Collapsed { .. } => Vec::new(),
        }
    }

    /// `hash(canonical(event))`, the unit folded into stream hashes.
    pub fn record_hash(&self) -> Result<Sha256Hash, AuditError> {
        Ok(hash_canonical(self)?)
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditEntry {
    /// Position in the log, from zero.
    pub entry_id: u64,
    pub timestamp: LogicalTimestamp,
    pub stream: Option<Stream>,
    pub event: AuditEvent,
    pub classification: Option<Classification>,
    pub decision: Decision,
    pub witnesses: Vec<Sha256Hash>,
    pub prev_entry_hash: Sha256Hash,
    /// Hash of every other field.
    pub entry_hash: Sha256Hash,
}

#[derive(Serialize)]
struct EntryHashInput<'a> {
    entry_id: u64,
    timestamp: &'a LogicalTimestamp,
    stream: Option<Stream>,
    event: &'a AuditEvent,
    classification: &'a Option<Classification>,
    decision: Decision,
    witnesses: &'a [Sha256Hash],
    prev_entry_hash: &'a Sha256Hash,
}

impl AuditEntry {
    /// Build and seal an entry that follows `prev_entry_hash`.
    pub fn seal(
        entry_id: u64,
        timestamp: LogicalTimestamp,
        event: AuditEvent,
        prev_entry_hash: Sha256Hash,
    ) -> Result<Self, AuditError> {
        let mut entry = Self {
            entry_id,
            timestamp,
            stream: event.stream(),
            classification: event.classification(),
            decision: event.decision(),
            witnesses: event.witnesses(),
            event,
            prev_entry_hash,
            entry_hash: Sha256Hash::ZERO,
        };
        entry.entry_hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// Hash of the entry with `entry_hash` omitted.
    pub fn compute_hash(&self) -> Result<Sha256Hash, AuditError> {
        Ok(hash_canonical(&EntryHashInput {
            entry_id: self.entry_id,
            timestamp: &self.timestamp,
            stream: self.stream,
            event: &self.event,
            classification: &self.classification,
            decision: self.decision,
            witnesses: &self.witnesses,
            prev_entry_hash: &self.prev_entry_hash,
        })?)
    }

    pub fn cycle(&self) -> u64 {
        self.timestamp.step
    }

    /// Whether the derived fields agree with the event.
    pub fn is_consistent(&self) -> bool {
        self.stream == self.event.stream()
            && self.classification == self.event.classification()
            && self.decision == self.event.decision()
            && self.witnesses == self.event.witnesses()
    }
}
