use std::collections::BTreeMap;

use authority_canonical::{chain_hash, hash_bytes, Sha256Hash};
use serde::{Deserialize, Serialize};

use crate::entry::{AuditEntry, Stream};

/// Entry-chain head: hash of the last entry and how many there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityChain {
    head: Sha256Hash,
    entry_count: u64,
}

impl IntegrityChain {
    pub fn new() -> Self {
        Self {
            head: Sha256Hash::ZERO,
            entry_count: 0,
        }
    }

    pub fn from_state(head: Sha256Hash, entry_count: u64) -> Self {
        Self { head, entry_count }
    }

    /// `prev_entry_hash` for the next entry.
    pub fn previous_hash(&self) -> Sha256Hash {
        self.head
    }

    /// `entry_id` for the next entry.
    pub fn next_id(&self) -> u64 {
        self.entry_count
    }

    pub fn update(&mut self, entry: &AuditEntry) {
        self.head = entry.entry_hash;
        self.entry_count += 1;
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

impl Default for IntegrityChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-stream hashes of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamHashes {
    pub ingress: Sha256Hash,
    pub admission: Sha256Hash,
    pub selector: Sha256Hash,
    pub execution: Sha256Hash,
    pub law: Sha256Hash,
}

impl StreamHashes {
    fn in_fold_order(&self) -> [Sha256Hash; 5] {
        [
            self.ingress,
            self.admission,
            self.selector,
            self.execution,
            self.law,
        ]
    }

    /// `SHA256(prev || H_ingress || H_admission || H_selector || H_execution || H_law)`.
    pub fn fold(&self, prev: &Sha256Hash) -> Sha256Hash {
        chain_hash(prev, &self.in_fold_order())
    }
}

/// Collects one cycle's record hashes per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleAccumulator {
    records: BTreeMap<Stream, Vec<Sha256Hash>>,
}

impl CycleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stream: Stream, record_hash: Sha256Hash) {
        self.records.entry(stream).or_default().push(record_hash);
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    fn stream_hash(&self, stream: Stream) -> Sha256Hash {
        let mut joined = Vec::new();
        for record in self.records.get(&stream).into_iter().flatten() {
            joined.extend_from_slice(record.as_bytes());
        }
        hash_bytes(&joined)
    }

    pub fn stream_hashes(&self) -> StreamHashes {
        StreamHashes {
            ingress: self.stream_hash(Stream::Ingress),
            admission: self.stream_hash(Stream::Admission),
            selector: self.stream_hash(Stream::Selector),
            execution: self.stream_hash(Stream::Execution),
            law: self.stream_hash(Stream::Law),
        }
    }

    /// Close the cycle: its stream hashes and the next state hash. Resets.
    pub fn finish(&mut self, prev_state: &Sha256Hash) -> (StreamHashes, Sha256Hash) {
        let hashes = self.stream_hashes();
        self.records.clear();
        let state = hashes.fold(prev_state);
        (hashes, state)
    }
}
