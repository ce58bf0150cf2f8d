use std::fmt;

use authority_canonical::EncodingError;
use thiserror::Error;

/// Why the chain is broken at a given entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakReason {
    /// The line is not a well-formed entry.
    Unparseable(String),
    /// The line parses but is not the exact serialization of its entry.
    NonCanonicalLine,
    /// `entry_id` is not the entry's position in the log.
    SequenceGap { expected: u64, found: u64 },
    /// `prev_entry_hash` does not match the previous entry.
    BrokenLink,
    /// `entry_hash` does not match the entry's contents.
    HashMismatch,
    /// Stream, decision, classification or witnesses disagree with the event.
    InconsistentFields,
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable(msg) => write!(f, "unparseable entry: {msg}"),
            Self::NonCanonicalLine => f.write_str("entry bytes differ from its serialization"),
            Self::SequenceGap { expected, found } => {
                write!(f, "entry id {found}, expected {expected}")
            }
            Self::BrokenLink => f.write_str("prev_entry_hash does not match previous entry"),
            Self::HashMismatch => f.write_str("entry_hash does not match contents"),
            Self::InconsistentFields => f.write_str("derived fields disagree with the event"),
        }
    }
}

/// Errors from the audit log.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("audit chain broken at entry {index}: {reason}")]
    ChainBroken { index: u64, reason: BreakReason },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("manifest error: {0}")]
    Manifest(String),
}
