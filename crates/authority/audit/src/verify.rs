//! Single-pass chain verification.

use std::path::Path;

use authority_canonical::Sha256Hash;
use tracing::{error, info};

use crate::entry::AuditEntry;
use crate::error::{AuditError, BreakReason};

/// What a successful verification saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub entries: u64,
    pub head: Sha256Hash,
    /// Cycle of the last entry, if any.
    pub last_cycle: Option<u64>,
}

fn broken(index: u64, reason: BreakReason) -> AuditError {
    error!(index, reason = %reason, "audit chain broken");
    AuditError::ChainBroken { index, reason }
}

/// Check one entry against its position and predecessor hash.
pub fn check_link(index: u64, entry: &AuditEntry, prev: &Sha256Hash) -> Result<(), AuditError> {
    if entry.entry_id != index {
        return Err(broken(
            index,
            BreakReason::SequenceGap {
                expected: index,
                found: entry.entry_id,
            },
        ));
    }
    if entry.prev_entry_hash != *prev {
        return Err(broken(index, BreakReason::BrokenLink));
    }
    if entry.compute_hash()? != entry.entry_hash {
        return Err(broken(index, BreakReason::HashMismatch));
    }
    if !entry.is_consistent() {
        return Err(broken(index, BreakReason::InconsistentFields));
    }
    Ok(())
}

/// Walk the chain once; fail at the first break with its index.
pub fn verify_entries(entries: &[AuditEntry]) -> Result<ChainSummary, AuditError> {
    let mut prev = Sha256Hash::ZERO;
    for (index, entry) in entries.iter().enumerate() {
        check_link(index as u64, entry, &prev)?;
        prev = entry.entry_hash;
    }
    Ok(ChainSummary {
        entries: entries.len() as u64,
        head: prev,
        last_cycle: entries.last().map(AuditEntry::cycle),
    })
}

fn parse_lines(
    path: &Path,
    mut each: impl FnMut(u64, AuditEntry) -> Result<(), AuditError>,
) -> Result<(), AuditError> {
    let bytes = std::fs::read(path)?;
    let body = bytes.strip_suffix(b"\n").unwrap_or(&bytes);
    if body.is_empty() {
        return Ok(());
    }
    for (index, raw) in body.split(|&b| b == b'\n').enumerate() {
        let index = index as u64;
        let line = std::str::from_utf8(raw)
            .map_err(|e| broken(index, BreakReason::Unparseable(e.to_string())))?;
        let entry: AuditEntry = serde_json::from_str(line)
            .map_err(|e| broken(index, BreakReason::Unparseable(e.to_string())))?;
        if serde_json::to_string(&entry)? != line {
            return Err(broken(index, BreakReason::NonCanonicalLine));
        }
        each(index, entry)?;
    }
    Ok(())
}

/// Parse a log file without checking links.
///
/// Each line must be exactly the serialization of the entry it parses to,
/// so a mutated byte anywhere is caught even when it still parses.
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let mut entries = Vec::new();
    parse_lines(path, |_, entry| {
        entries.push(entry);
        Ok(())
    })?;
    Ok(entries)
}

/// Parse a log file, checking each link as it is read.
pub(crate) fn walk_verified(
    path: &Path,
    mut each: impl FnMut(AuditEntry),
) -> Result<ChainSummary, AuditError> {
    let mut summary = ChainSummary {
        entries: 0,
        head: Sha256Hash::ZERO,
        last_cycle: None,
    };
    parse_lines(path, |index, entry| {
        check_link(index, &entry, &summary.head)?;
        summary.entries = index + 1;
        summary.head = entry.entry_hash;
        summary.last_cycle = Some(entry.cycle());
        each(entry);
        Ok(())
    })?;
    Ok(summary)
}

/// Parse and verify a log file.
pub(crate) fn load_verified(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let mut entries = Vec::new();
    walk_verified(path, |entry| entries.push(entry))?;
    Ok(entries)
}

/// Verify the log at `path` in one walk.
pub fn verify_file(path: &Path) -> Result<ChainSummary, AuditError> {
    let summary = walk_verified(path, |_| {})?;
    info!(
        path = %path.display(),
        entries = summary.entries,
        head = %summary.head,
        "audit chain verified"
    );
    Ok(summary)
}
