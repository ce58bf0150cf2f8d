use std::fmt;

use authority_audit::{AuditError, BreakReason};
use authority_canonical::Sha256Hash;
use authority_law::{LawError, LawTransition};
use authority_types::{Classification, LogicalTimestamp};
use serde::Serialize;
use thiserror::Error;

/// What differed between the log and the recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivergenceKind {
    ChainBroken(BreakReason),
    Timestamp {
        expected: LogicalTimestamp,
        found: LogicalTimestamp,
    },
    /// The entry cannot follow what came before it.
    UnexpectedEvent {
        expected: &'static str,
        found: &'static str,
    },
    CycleOrder {
        expected: u64,
        found: u64,
    },
    /// `raw_hex` does not decode or does not hash to `bundle_hash`.
    BundleBytes,
    Classification {
        logged: Classification,
        recomputed: Classification,
    },
    /// Claim id, position or refusal token of a classification record.
    ClassificationRecord(&'static str),
    Warrant {
        logged: Sha256Hash,
        recomputed: Sha256Hash,
    },
    UnauthorizedSelection {
        warrant_id: Sha256Hash,
    },
    Enforcement {
        warrant_id: Sha256Hash,
        logged: String,
        recomputed: String,
    },
    Effect {
        warrant_id: Sha256Hash,
    },
    UnknownWarrant {
        warrant_id: Sha256Hash,
    },
    LawTransition {
        logged: LawTransition,
        recomputed: LawTransition,
    },
    RecoveryRecord,
    CollapseRecord,
    StreamHashes,
    StateHash {
        logged: Sha256Hash,
        recomputed: Sha256Hash,
    },
    /// Comparison against an externally supplied state-hash sequence.
    StateHashSequence {
        expected: Option<Sha256Hash>,
        recomputed: Option<Sha256Hash>,
    },
    AfterCollapse,
}

fn opt(hash: &Option<Sha256Hash>) -> String {
    hash.map_or_else(|| "nothing".to_string(), |h| h.to_hex())
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainBroken(reason) => write!(f, "chain broken: {reason}"),
            Self::Timestamp { expected, found } => write!(
                f,
                "timestamp {}/{}/{}, expected {}/{}/{}",
                found.run_id, found.step, found.index, expected.run_id, expected.step, expected.index
            ),
            Self::UnexpectedEvent { expected, found } => {
                write!(f, "unexpected {found} entry, expected {expected}")
            }
            Self::CycleOrder { expected, found } => {
                write!(f, "cycle {found} out of order, expected {expected}")
            }
            Self::BundleBytes => f.write_str("logged bundle bytes do not match their hash"),
            Self::Classification { logged, recomputed } => {
                write!(f, "classification logged {logged}, recomputed {recomputed}")
            }
            Self::ClassificationRecord(field) => {
                write!(f, "classification record field `{field}` differs")
            }
            Self::Warrant { logged, recomputed } => {
                write!(f, "warrant logged {logged}, recomputed {recomputed}")
            }
            Self::UnauthorizedSelection { warrant_id } => {
                write!(f, "selection of warrant {warrant_id} that was never offered")
            }
            Self::Enforcement {
                warrant_id,
                logged,
                recomputed,
            } => write!(
                f,
                "enforcement of {warrant_id} logged {logged}, recomputed {recomputed}"
            ),
            Self::Effect { warrant_id } => write!(f, "effect for {warrant_id} differs"),
            Self::UnknownWarrant { warrant_id } => {
                write!(f, "reconciled effect for unknown or executed warrant {warrant_id}")
            }
            Self::LawTransition { logged, recomputed } => {
                write!(f, "law transition logged {logged:?}, recomputed {recomputed:?}")
            }
            Self::RecoveryRecord => f.write_str("recovery record does not match the run"),
            Self::CollapseRecord => f.write_str("collapse record does not match the run"),
            Self::StreamHashes => f.write_str("stream hashes differ"),
            Self::StateHash { logged, recomputed } => {
                write!(f, "state hash logged {logged}, recomputed {recomputed}")
            }
            Self::StateHashSequence {
                expected,
                recomputed,
            } => write!(
                f,
                "state hash expected {}, recomputed {}",
                opt(expected),
                opt(recomputed)
            ),
            Self::AfterCollapse => f.write_str("entry after collapse"),
        }
    }
}

/// The first point where the log and the recomputation disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub cycle: u64,
    pub entry_index: u64,
    pub kind: DivergenceKind,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replay diverged at cycle {} (entry {}): {}",
            self.cycle, self.entry_index, self.kind
        )
    }
}

/// Serializable form for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct DivergenceSummary {
    pub cycle: u64,
    pub entry_index: u64,
    pub kind: String,
}

impl From<&Divergence> for DivergenceSummary {
    fn from(d: &Divergence) -> Self {
        Self {
            cycle: d.cycle,
            entry_index: d.entry_index,
            kind: d.kind.to_string(),
        }
    }
}

/// Errors from replay. Every one is fatal.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("{0}")]
    Divergence(Divergence),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("log does not start with a run header")]
    MissingRunHeader,

    #[error("configuration drift: log was written under {logged}, replaying under {frozen}")]
    ConfigDrift {
        logged: Sha256Hash,
        frozen: Sha256Hash,
    },

    #[error("law error: {0}")]
    Law(#[from] LawError),
}

impl From<Divergence> for ReplayError {
    fn from(d: Divergence) -> Self {
        Self::Divergence(d)
    }
}
