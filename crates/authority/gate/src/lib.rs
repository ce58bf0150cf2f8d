#![deny(unsafe_code)]
//! # authority-gate
//!
//! The two gates between a classified claim and an effect.
//!
//! - [`precognitive_filter`] runs right after classification. Only `VALID`
//!   bundles pass; everything else becomes an opaque [`RefusalToken`].
//! - [`WarrantIssuer`] turns an admitted claim into a content-derived
//!   [`Warrant`] bound to the epoch current at classification.
//! - [`EnforcementGate`] re-checks the warrant against law-state *at the
//!   moment of effect* (consumption, revocation, epoch/expiry, rate).
//! - [`Executor`] applies an effect at an [`EffectSink`] and records
//!   consumption in the same logical step.
//!
//! [`RefusalToken`]: authority_types::RefusalToken
//! [`Warrant`]: authority_types::Warrant

pub mod destination;
pub mod enforcement;
pub mod error;
pub mod executor;
pub mod filter;
pub mod issuer;
pub mod pending;

pub use destination::{EffectSink, FileDestination, MemoryDestination};
pub use enforcement::EnforcementGate;
pub use error::GateError;
pub use executor::{ExecutionOutcome, Executor};
pub use filter::{precognitive_filter, Admission};
pub use issuer::WarrantIssuer;
pub use pending::PendingWarrants;
