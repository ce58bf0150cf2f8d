use authority_canonical::EncodingError;

/// Errors from building or signing kernel types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("invalid signer id: {0}")]
    InvalidSignerId(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
