#![deny(unsafe_code)]
//! # authority-canonical
//!
//! Canonical encoding and content identity for the authority kernel.
//!
//! Every hash the kernel computes goes through this crate:
//!
//! ```text
//! hash(v) = SHA256(canonical_bytes(v))      rendered as lowercase hex
//! ```
//!
//! Canonical bytes are compact JSON with map keys sorted by byte value,
//! arrays in their given order, integers in decimal and floats in fixed
//! precision with trailing zeros trimmed. Non-finite floats can never be
//! represented: they are rejected with [`EncodingError`] when a
//! [`CanonicalValue`] is constructed, so encoding itself is total.
//!
//! A float that trims to an integer encodes exactly like that integer
//! (`1.0` and `1` share bytes). The loss is accepted and must not be
//! "fixed": identifiers already derived depend on it.

pub mod error;
pub mod hash;
pub mod value;

pub use error::EncodingError;
pub use hash::{chain_hash, hash_bytes, hash_canonical, hash_value, Sha256Hash, Sha256HashError};
pub use value::{canonical_bytes, canonical_json, to_canonical, CanonicalValue, FiniteFloat};
