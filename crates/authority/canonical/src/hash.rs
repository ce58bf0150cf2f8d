use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EncodingError;
use crate::value::{canonical_bytes, canonical_json, CanonicalValue};

/// SHA-256 content identity (32 bytes, lowercase hex on the wire).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// All-zero sentinel; the genesis `prev_entry_hash`.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Result<Self, Sha256HashError> {
        if text.len() != 64 {
            return Err(Sha256HashError::InvalidLength(text.len()));
        }
        if text.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(Sha256HashError::NotLowercase);
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| Sha256HashError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Sha256Hash {
    type Err = Sha256HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha256Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Sha256HashError {
    #[error("invalid hex length: {0} (expected 64)")]
    InvalidLength(usize),
    #[error("hash must be lowercase hex")]
    NotLowercase,
    #[error("invalid hex character")]
    InvalidHex,
}

/// SHA-256 of raw bytes.
pub fn hash_bytes(data: &[u8]) -> Sha256Hash {
    Sha256Hash(Sha256::digest(data).into())
}

/// `SHA256(canonical_bytes(value))`.
pub fn hash_value(value: &CanonicalValue) -> Sha256Hash {
    hash_bytes(&canonical_bytes(value))
}

/// Hash of the canonical form of any serializable value.
pub fn hash_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Sha256Hash, EncodingError> {
    Ok(hash_bytes(&canonical_json(value)?))
}

/// `SHA256(prev || parts[0] || … || parts[k])` over raw 32-byte digests.
///
/// Raw bytes, not hex text, are concatenated. The two choices produce
/// different chains, so this is fixed for every log the kernel writes.
pub fn chain_hash(prev: &Sha256Hash, parts: &[Sha256Hash]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(prev.0);
    for part in parts {
        hasher.update(part.0);
    }
    Sha256Hash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            hash_bytes(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_roundtrip_is_lowercase() {
        let h = hash_bytes(b"authority");
        let text = h.to_hex();
        assert!(text.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(Sha256Hash::from_hex(&text).unwrap(), h);
        assert!(Sha256Hash::from_hex(&text.to_uppercase()).is_err());
        assert!(Sha256Hash::from_hex("abc").is_err());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let h = hash_bytes(b"x");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Sha256Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn chain_hash_concatenates_raw_bytes() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        let mut joined = Vec::new();
        joined.extend_from_slice(&Sha256Hash::ZERO.0);
        joined.extend_from_slice(&a.0);
        joined.extend_from_slice(&b.0);
        assert_eq!(chain_hash(&Sha256Hash::ZERO, &[a, b]), hash_bytes(&joined));
        assert_ne!(chain_hash(&Sha256Hash::ZERO, &[a, b]), chain_hash(&Sha256Hash::ZERO, &[b, a]));
    }

    #[test]
    fn hash_value_matches_manual_digest() {
        let v = CanonicalValue::map([("k", CanonicalValue::Bool(true))]);
        assert_eq!(hash_value(&v), hash_bytes(br#"{"k":true}"#));
    }
}
