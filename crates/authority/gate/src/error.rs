use authority_canonical::EncodingError;
use authority_types::TypesError;
use thiserror::Error;

/// Errors from warrant issuance and effect application.
///
/// Enforcement refusals are not errors; see
/// [`EnforcementRefusal`](authority_types::EnforcementRefusal).
#[derive(Error, Debug)]
pub enum GateError {
    #[error("destination error: {0}")]
    Destination(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("types error: {0}")]
    Types(#[from] TypesError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
