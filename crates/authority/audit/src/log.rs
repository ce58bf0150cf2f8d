//! Audit log backends.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use authority_canonical::Sha256Hash;
use authority_types::LogicalTimestamp;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::chain::IntegrityChain;
use crate::entry::{AuditEntry, AuditEvent};
use crate::error::AuditError;
use crate::verify::{load_verified, walk_verified};

/// Append-only, single-writer audit log.
///
/// `append` returns only after the entry is durable; the caller may act on
/// a decision once its entry is back.
pub trait AuditLog: Send + Sync {
    fn append(&self, timestamp: LogicalTimestamp, event: AuditEvent)
        -> Result<AuditEntry, AuditError>;

    /// Every entry, in append order.
    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError>;

    fn entry_count(&self) -> u64;

    /// Hash of the last entry, or zero for an empty log.
    fn head(&self) -> Sha256Hash;
}

/// In-memory log for tests and dry runs.
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    chain: RwLock<IntegrityChain>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            chain: RwLock::new(IntegrityChain::new()),
        }
    }

    /// Seed from existing entries (trusted; verify them first).
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        let chain = match entries.last() {
            Some(last) => IntegrityChain::from_state(last.entry_hash, entries.len() as u64),
            None => IntegrityChain::new(),
        };
        Self {
            entries: RwLock::new(entries),
            chain: RwLock::new(chain),
        }
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(
        &self,
        timestamp: LogicalTimestamp,
        event: AuditEvent,
    ) -> Result<AuditEntry, AuditError> {
        let mut chain = self.chain.write();
        let entry = AuditEntry::seal(chain.next_id(), timestamp, event, chain.previous_hash())?;
        chain.update(&entry);
        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self.entries.read().clone())
    }

    fn entry_count(&self) -> u64 {
        self.chain.read().entry_count()
    }

    fn head(&self) -> Sha256Hash {
        self.chain.read().previous_hash()
    }
}

/// JSON-lines log file. Each append is written and synced before returning.
pub struct FileAuditLog {
    path: PathBuf,
    chain: RwLock<IntegrityChain>,
}

impl FileAuditLog {
    /// Open or create the log at `path`.
    ///
    /// An existing log is verified end to end first; a broken chain is an
    /// error. A torn final line (a write that never completed) is cut off.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let chain = if path.exists() {
            truncate_torn_tail(&path)?;
            let summary = walk_verified(&path, |_| {})?;
            match summary.entries {
                0 => IntegrityChain::new(),
                n => IntegrityChain::from_state(summary.head, n),
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            IntegrityChain::new()
        };
        debug!(path = %path.display(), entries = chain.entry_count(), "audit log opened");
        Ok(Self {
            path,
            chain: RwLock::new(chain),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn truncate_torn_tail(path: &Path) -> Result<(), AuditError> {
    let bytes = std::fs::read(path)?;
    if bytes.last().map_or(true, |&b| b == b'\n') {
        return Ok(());
    }
    let keep = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "truncating torn audit log tail"
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_data()?;
    Ok(())
}

impl AuditLog for FileAuditLog {
    fn append(
        &self,
        timestamp: LogicalTimestamp,
        event: AuditEvent,
    ) -> Result<AuditEntry, AuditError> {
        // Single writer: the chain lock is held across the write.
        let mut chain = self.chain.write();
        let entry = AuditEntry::seal(chain.next_id(), timestamp, event, chain.previous_hash())?;
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.flush()?;
        file.sync_data()?;

        chain.update(&entry);
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let _chain = self.chain.read();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        load_verified(&self.path)
    }

    fn entry_count(&self) -> u64 {
        self.chain.read().entry_count()
    }

    fn head(&self) -> Sha256Hash {
        self.chain.read().previous_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(step: u64, index: u64) -> LogicalTimestamp {
        LogicalTimestamp::new("run", step, index)
    }

    fn write_some(log: &dyn AuditLog, n: u64) {
        for i in 0..n {
            log.append(ts(i, 0), AuditEvent::StepStarted { cycle: i })
                .unwrap();
        }
    }

    #[test]
    fn memory_log_chains_entries() {
        let log = MemoryAuditLog::new();
        write_some(&log, 3);
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].prev_entry_hash, Sha256Hash::ZERO);
        assert_eq!(entries[1].prev_entry_hash, entries[0].entry_hash);
        assert_eq!(log.head(), entries[2].entry_hash);
        assert_eq!(log.entry_count(), 3);
    }

    #[test]
    fn file_log_reopens_at_head() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let head = {
            let log = FileAuditLog::open(&path).unwrap();
            write_some(&log, 2);
            log.head()
        };
        let log = FileAuditLog::open(&path).unwrap();
        assert_eq!(log.head(), head);
        assert_eq!(log.entry_count(), 2);
        let entry = log.append(ts(2, 0), AuditEvent::StepStarted { cycle: 2 }).unwrap();
        assert_eq!(entry.entry_id, 2);
        assert_eq!(entry.prev_entry_hash, head);
        assert_eq!(log.entries().unwrap().len(), 3);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let log = FileAuditLog::open(&path).unwrap();
            write_some(&log, 2);
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"entry_id\":2,\"times").unwrap();
        drop(file);

        let log = FileAuditLog::open(&path).unwrap();
        assert_eq!(log.entry_count(), 2);
        assert_eq!(log.entries().unwrap().len(), 2);
    }

    #[test]
    fn corrupted_log_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let log = FileAuditLog::open(&path).unwrap();
            write_some(&log, 3);
        }
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replacen("\"cycle\":1", "\"cycle\":9", 1)).unwrap();
        assert!(matches!(
            FileAuditLog::open(&path),
            Err(AuditError::ChainBroken { index: 1, .. })
        ));
    }
}
