use std::collections::{BTreeMap, BTreeSet};

use authority_audit::{AuditError, AuditEvent, CollapseReason, CycleAccumulator, StreamHashes};
use authority_canonical::Sha256Hash;
use authority_gate::PendingWarrants;
use authority_law::{ConsumptionRegistry, KernelConfig, LawError, LawState};
use authority_types::{LogicalTimestamp, Warrant};

/// Everything a run has accumulated, as of the last logged entry.
///
/// The kernel runs on exactly this state and replay rebuilds it from the
/// log alone, so a resumed kernel and a fresh replay agree by construction.
#[derive(Debug, Clone)]
pub struct RunState {
    pub law: LawState,
    pub registry: ConsumptionRegistry,
    /// Warrants the agent layer may still select.
    pub pending: PendingWarrants,
    /// Every warrant ever issued.
    pub issued: BTreeMap<Sha256Hash, Warrant>,
    /// Warrants whose effect was applied, logged or reconciled.
    pub executed: BTreeSet<Sha256Hash>,
    pub accumulator: CycleAccumulator,
    /// `state_hash[0..=n]`, genesis first.
    pub state_hashes: Vec<Sha256Hash>,
    /// Current cycle if open, otherwise the last committed one.
    pub cycle: u64,
    pub open: bool,
    next_index: u64,
    pub collapsed: Option<CollapseReason>,
}

impl RunState {
    pub fn genesis(config: &KernelConfig) -> Result<Self, LawError> {
        Ok(Self {
            law: LawState::from_config(config),
            registry: ConsumptionRegistry::new(),
            pending: PendingWarrants::new(),
            issued: BTreeMap::new(),
            executed: BTreeSet::new(),
            accumulator: CycleAccumulator::new(),
            state_hashes: vec![config.root_identity()?],
            cycle: 0,
            open: false,
            next_index: 0,
            collapsed: None,
        })
    }

    pub fn state_hash(&self) -> Sha256Hash {
        self.state_hashes
            .last()
            .copied()
            .unwrap_or(Sha256Hash::ZERO)
    }

    pub fn last_committed(&self) -> u64 {
        self.state_hashes.len().saturating_sub(1) as u64
    }

    pub fn open_cycle(&self) -> Option<u64> {
        self.open.then_some(self.cycle)
    }

    /// Timestamp for the next entry, advancing the in-cycle index.
    pub fn next_timestamp(&mut self, run_id: &str) -> LogicalTimestamp {
        let ts = LogicalTimestamp::new(run_id, self.cycle, self.next_index);
        self.next_index += 1;
        ts
    }

    pub fn begin_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
        self.open = true;
        self.next_index = 0;
        self.pending.prune_expired(cycle);
    }

    /// Fold the event into this cycle's stream hashes, if it is a record.
    pub fn record(&mut self, event: &AuditEvent) -> Result<(), AuditError> {
        if let Some(stream) = event.stream() {
            self.accumulator.push(stream, event.record_hash()?);
        }
        Ok(())
    }

    pub fn admit(&mut self, warrant: Warrant) {
        self.pending.insert(warrant.clone());
        self.issued.insert(warrant.warrant_id, warrant);
    }

    /// An issued warrant with no applied effect yet.
    pub fn unexecuted(&self, warrant_id: &Sha256Hash) -> Option<&Warrant> {
        if self.executed.contains(warrant_id) {
            return None;
        }
        self.issued.get(warrant_id)
    }

    /// The warrant's effect has been applied; it can never be offered again.
    pub fn mark_executed(&mut self, warrant_id: Sha256Hash) {
        self.pending.remove(&warrant_id);
        self.executed.insert(warrant_id);
    }

    /// Close the open cycle.
    pub fn commit(&mut self) -> (StreamHashes, Sha256Hash) {
        let (hashes, state) = self.accumulator.finish(&self.state_hash());
        self.state_hashes.push(state);
        self.open = false;
        (hashes, state)
    }
}
