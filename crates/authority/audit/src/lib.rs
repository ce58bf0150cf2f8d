#![deny(unsafe_code)]
//! # authority-audit
//!
//! Single-writer, append-only, hash-chained audit log.
//!
//! Every entry links to its predecessor through `prev_entry_hash`; the
//! genesis entry links to the all-zero hash. Stream records (ingress,
//! admission, selector, execution, law) are additionally folded, per cycle,
//! into the state-hash chain:
//!
//! ```text
//! state_hash[0] = root_identity
//! state_hash[n] = SHA256(state_hash[n-1] || H_ingress[n] || H_admission[n]
//!                        || H_selector[n] || H_execution[n] || H_law[n])
//! ```
//!
//! where each `H_s[n]` is the SHA-256 of the raw concatenation of that
//! stream's record hashes for cycle `n`, in append order.

pub mod chain;
pub mod entry;
pub mod error;
pub mod log;
pub mod manifest;
pub mod verify;

pub use chain::{CycleAccumulator, IntegrityChain, StreamHashes};
pub use entry::{AuditEntry, AuditEvent, CollapseReason, Decision, Stream};
pub use error::{AuditError, BreakReason};
pub use log::{AuditLog, FileAuditLog, MemoryAuditLog};
pub use manifest::{manifest_path, RunManifest};
pub use verify::{check_link, read_entries, verify_entries, verify_file, ChainSummary};
