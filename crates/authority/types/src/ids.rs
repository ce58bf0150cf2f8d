use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Namespace reserved for law-state transitions (`law/epoch`, `law/revocation`).
pub const LAW_NAMESPACE: &str = "law";

/// Identity of a signer: the lowercase hex of its ed25519 verifying key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignerId(String);

impl SignerId {
    pub fn parse(text: &str) -> Result<Self, TypesError> {
        let well_formed = text.len() == 64
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(text.to_string()))
        } else {
            Err(TypesError::InvalidSignerId(text.to_string()))
        }
    }

    pub fn from_key_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw key bytes. Always succeeds for a parsed id.
    pub fn key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Length and alphabet were checked on construction.
        let _ = hex::decode_to_slice(&self.0, &mut out);
        out
    }
}

impl TryFrom<String> for SignerId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SignerId> for String {
    fn from(value: SignerId) -> Self {
        value.0
    }
}

impl fmt::Debug for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerId({})", &self.0[..12])
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A namespaced scope string, `namespace/path`.
///
/// Allowed characters are ASCII alphanumerics and `-_./`; the namespace is
/// the non-empty segment before the first `/`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    pub fn parse(text: &str) -> Result<Self, TypesError> {
        let charset_ok = text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/'));
        let shape_ok = match text.split_once('/') {
            Some((ns, rest)) => !ns.is_empty() && !rest.is_empty() && !text.ends_with('/'),
            None => false,
        };
        if charset_ok && shape_ok && text.len() <= 256 {
            Ok(Self(text.to_string()))
        } else {
            Err(TypesError::InvalidScope(text.to_string()))
        }
    }

    pub fn namespace(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_law(&self) -> bool {
        self.namespace() == LAW_NAMESPACE
    }
}

impl TryFrom<String> for Scope {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Scope> for String {
    fn from(value: Scope) -> Self {
        value.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
