use authority_canonical::EncodingError;

/// Errors from configuration loading and law-state transitions.
#[derive(Debug, thiserror::Error)]
pub enum LawError {
    #[error("epoch regression: current {current}, requested {requested}")]
    EpochRegression { current: u64, requested: u64 },

    #[error("transition does not apply to current law-state: {0}")]
    TransitionMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
