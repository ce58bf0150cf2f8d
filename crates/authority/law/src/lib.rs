#![deny(unsafe_code)]
//! # authority-law
//!
//! Everything the kernel evaluates claims against:
//!
//! - [`KernelConfig`]: frozen, hashed run configuration (roots of trust,
//!   actor grants, namespaces, windows, budgets)
//! - [`LawState`]: current epoch and permanent revocations
//! - [`ConsumptionRegistry`]: consumed warrants and claims, per-cycle rate
//!   counters
//!
//! `LawState` changes only through epoch advance and revocation; the
//! registry only through consumption.

pub mod config;
pub mod error;
pub mod registry;
pub mod state;

pub use config::{KernelConfig, Revocations, StepBudget, CONFIG_SCHEMA_VERSION};
pub use error::LawError;
pub use registry::ConsumptionRegistry;
pub use state::{LawState, LawTransition};
