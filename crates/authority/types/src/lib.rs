#![deny(unsafe_code)]
//! # authority-types
//!
//! The closed vocabulary of the authority kernel.
//!
//! - [`AuthorityClaim`] / [`Delegation`] / [`ProvenanceBundle`]: what arrives at ingress
//! - [`Classification`]: the four terminal outcomes of classification
//! - [`Warrant`]: content-derived, single-use authorization
//! - [`Effect`]: what an executed warrant does at the destination
//! - [`AuthorityKey`]: ed25519 signing for claims and delegations
//!
//! Every enum here is exhaustive; downstream code matches on them instead of
//! comparing strings.

pub mod bundle;
pub mod claim;
pub mod classification;
pub mod delegation;
pub mod error;
pub mod ids;
pub mod signing;
pub mod warrant;

pub use bundle::ProvenanceBundle;
pub use claim::{
    ActionRequest, AuthorityClaim, ClaimBuilder, ClaimType, LogicalTimestamp, PolicyOp,
    SignatureArtifact,
};
pub use classification::{
    AmbiguitySubtype, Classification, InvalidReason, MalformedDefect, RefusalToken,
};
pub use delegation::{Delegation, DelegationBuilder};
pub use error::TypesError;
pub use ids::{Scope, SignerId, LAW_NAMESPACE};
pub use signing::{verify_signature, AuthorityKey, SIGNATURE_HEX_LEN};
pub use warrant::{DelegationRef, Effect, EnforcementRefusal, Warrant, WarrantPayload};
