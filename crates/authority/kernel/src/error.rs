use authority_audit::{AuditError, CollapseReason};
use authority_canonical::EncodingError;
use authority_gate::GateError;
use authority_law::LawError;
use authority_replay::ReplayError;
use thiserror::Error;

/// Errors from the kernel. None are retried.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Terminal. The collapse is already in the log.
    #[error("evaluator collapse: {0}")]
    Collapse(CollapseReason),

    #[error("kernel halted after an earlier failure")]
    Halted,

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("law error: {0}")]
    Law(#[from] LawError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("feed line {line}: {message}")]
    Feed { line: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
