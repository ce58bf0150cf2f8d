#![deny(unsafe_code)]
//! # authority-replay
//!
//! Rebuilds a run from its audit log alone and fails at the first entry
//! that the frozen rules would not have produced.
//!
//! Replay reads no clock, draws no randomness and calls no service. Its
//! only inputs are the log and the configuration the log's header commits
//! to; its output is the state-hash sequence, or a [`Divergence`] naming
//! the first cycle and entry that disagree.

pub mod error;
pub mod replayer;
pub mod state;

pub use error::{Divergence, DivergenceKind, DivergenceSummary, ReplayError};
pub use replayer::{replay, replay_file, ReplayReport, Replayer};
pub use state::RunState;
