/// Errors raised while building a canonical value.
///
/// Encoding failures are fatal to the single operation that triggered them
/// and are never coerced into a neighbouring value.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("non-finite float cannot be canonicalized: {0}")]
    NonFiniteFloat(f64),

    #[error("float magnitude exceeds canonical bound: {0}")]
    FloatOutOfRange(f64),

    #[error("integer exceeds canonical range: {0}")]
    IntegerOutOfRange(String),

    #[error("value is not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),
}
