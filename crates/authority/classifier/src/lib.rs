#![deny(unsafe_code)]
//! # authority-classifier
//!
//! Raw ingress bytes in, exactly one [`Classification`] out.
//!
//! Checks run in a fixed order and the first failure is the outcome:
//!
//! 1. structure (encoding, JSON shape, duplicate keys)
//! 2. required fields
//! 3. types
//! 4. signature
//! 5. issuer trust
//! 6. scope
//! 7. freshness / epoch
//! 8. revocation
//!
//! Steps 1–3 live in [`decode`]; steps 4–8 are [`CheckStage`]s, with the
//! delegation-specific rules factored into [`ProvenanceValidator`].
//! Classification never panics and never returns an error: every input has
//! an outcome.
//!
//! [`Classification`]: authority_types::Classification

pub mod classifier;
pub mod decode;
pub mod provenance;
pub mod stages;
mod strict;

pub use classifier::{ClaimClassifier, ClassifiedBundle};
pub use decode::decode_bundle;
pub use provenance::ProvenanceValidator;
pub use stages::{CheckContext, CheckStage};
