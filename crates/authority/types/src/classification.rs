use std::fmt;

use authority_canonical::{hash_bytes, Sha256Hash};
use serde::{Deserialize, Serialize};

/// Closed reason codes for well-formed but unauthorized claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    SignatureInvalid,
    IssuerUnknown,
    ScopeMismatch,
    ExpiredCredential,
    RevokedCredential,
    MissingDelegation,
    UntrustedRoot,
    DelegateIdentityMismatch,
    DelegationIdMismatch,
    ScopeNotInDelegation,
    EpochMismatch,
    NotYetValid,
}

impl InvalidReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::IssuerUnknown => "ISSUER_UNKNOWN",
            Self::ScopeMismatch => "SCOPE_MISMATCH",
            Self::ExpiredCredential => "EXPIRED_CREDENTIAL",
            Self::RevokedCredential => "REVOKED_CREDENTIAL",
            Self::MissingDelegation => "MISSING_DELEGATION",
            Self::UntrustedRoot => "UNTRUSTED_ROOT",
            Self::DelegateIdentityMismatch => "DELEGATE_IDENTITY_MISMATCH",
            Self::DelegationIdMismatch => "DELEGATION_ID_MISMATCH",
            Self::ScopeNotInDelegation => "SCOPE_NOT_IN_DELEGATION",
            Self::EpochMismatch => "EPOCH_MISMATCH",
            Self::NotYetValid => "NOT_YET_VALID",
        }
    }
}

/// Transport or structural ambiguity. Never used for authorization failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmbiguitySubtype {
    /// The bundle text ends before the JSON document does.
    TruncatedBundle,
    /// The signature is a clean hex prefix of a full signature.
    TruncatedArtifact,
    /// The same key appears twice in one object.
    ConflictingParse,
    /// The byte stream ends inside a UTF-8 sequence.
    PartialDecode,
}

impl AmbiguitySubtype {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TruncatedBundle => "TRUNCATED_BUNDLE",
            Self::TruncatedArtifact => "TRUNCATED_ARTIFACT",
            Self::ConflictingParse => "CONFLICTING_PARSE",
            Self::PartialDecode => "PARTIAL_DECODE",
        }
    }
}

/// What made a bundle malformed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "defect", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MalformedDefect {
    Empty,
    Oversized,
    InvalidEncoding,
    Syntax,
    NotAnObject,
    MissingField { field: String },
    FieldType { field: String },
    UnknownField { field: String },
}

impl MalformedDefect {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn field_type(field: impl Into<String>) -> Self {
        Self::FieldType {
            field: field.into(),
        }
    }

    pub fn unknown(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }
}

/// Terminal outcome of classifying one bundle against one law-state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Valid,
    Invalid(InvalidReason),
    Ambiguous(AmbiguitySubtype),
    Malformed(MalformedDefect),
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid(_) => "INVALID",
            Self::Ambiguous(_) => "AMBIGUOUS",
            Self::Malformed(_) => "MALFORMED",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("VALID"),
            Self::Invalid(reason) => write!(f, "INVALID({})", reason.code()),
            Self::Ambiguous(subtype) => write!(f, "AMBIGUOUS({})", subtype.code()),
            Self::Malformed(defect) => write!(f, "MALFORMED({defect:?})"),
        }
    }
}

/// Opaque handle for a refused bundle.
///
/// The agent layer sees this instead of the claim or the reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefusalToken(pub Sha256Hash);

impl RefusalToken {
    /// `SHA256("refusal" || bundle_hash || cycle || position)`.
    pub fn derive(bundle_hash: &Sha256Hash, cycle: u64, position: u64) -> Self {
        let mut material = b"refusal".to_vec();
        material.extend_from_slice(bundle_hash.as_bytes());
        material.extend_from_slice(&cycle.to_be_bytes());
        material.extend_from_slice(&position.to_be_bytes());
        Self(hash_bytes(&material))
    }
}
