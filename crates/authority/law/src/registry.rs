use std::collections::{BTreeMap, BTreeSet};

use authority_canonical::Sha256Hash;
use serde::{Deserialize, Serialize};

/// Consumed warrants and claims, plus per-cycle execution counters.
///
/// Single writer: only the executor records consumption, and only in the
/// same logical step that applies the effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRegistry {
    warrants: BTreeSet<Sha256Hash>,
    claims: BTreeSet<String>,
    counter_cycle: u64,
    namespace_counts: BTreeMap<String, u32>,
}

impl ConsumptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_warrant_consumed(&self, warrant_id: &Sha256Hash) -> bool {
        self.warrants.contains(warrant_id)
    }

    pub fn is_claim_consumed(&self, claim_id: &str) -> bool {
        self.claims.contains(claim_id)
    }

    /// Executions already recorded in `namespace` during `cycle`.
    pub fn executions_in(&self, cycle: u64, namespace: &str) -> u32 {
        if cycle != self.counter_cycle {
            return 0;
        }
        self.namespace_counts.get(namespace).copied().unwrap_or(0)
    }

    pub fn consume(&mut self, warrant_id: Sha256Hash, claim_id: &str, namespace: &str, cycle: u64) {
        if cycle != self.counter_cycle {
            self.counter_cycle = cycle;
            self.namespace_counts.clear();
        }
        self.warrants.insert(warrant_id);
        self.claims.insert(claim_id.to_string());
        *self.namespace_counts.entry(namespace.to_string()).or_insert(0) += 1;
    }

    pub fn consumed_count(&self) -> usize {
        self.warrants.len()
    }
}
