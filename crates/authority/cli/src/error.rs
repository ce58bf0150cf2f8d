//! CLI error types

use authority_audit::AuditError;
use authority_gate::GateError;
use authority_kernel::KernelError;
use authority_law::LawError;
use authority_replay::ReplayError;
use thiserror::Error;

/// CLI error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] LawError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Destination error: {0}")]
    Destination(#[from] GateError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Configuration does not match the run manifest: {0}")]
    ManifestMismatch(String),

    #[error("Check failed: {0}")]
    Failed(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
