#![deny(unsafe_code)]
//! # authority-kernel
//!
//! Single-process, single-writer authority kernel.
//!
//! ```text
//! raw bundle ─▶ BundleReceived ─▶ classify ─▶ ClaimClassified ─┬─▶ refusal token
//!                                                             └─▶ WarrantIssued
//!                  AgentView ─▶ Selector ─▶ ActionsSelected ─▶ enforcement gate
//!                  ─▶ effect ─▶ EffectExecuted / EnforcementRefused ─▶ StepCommitted
//! ```
//!
//! Bundles in a step are processed in a permutation fixed by the run seed
//! and the cycle number. Each step runs under an iteration and wall-clock
//! budget; exceeding either collapses the run, and a collapsed run never
//! steps again.

pub mod error;
pub mod feed;
pub mod kernel;
pub mod order;
pub mod selector;

pub use error::KernelError;
pub use feed::{parse_feed, read_feed, FeedStep};
pub use kernel::{Kernel, StepReport};
pub use order::processing_order;
pub use selector::{AgentView, AuthorizedAction, SelectAll, Selector};
