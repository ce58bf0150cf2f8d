//! Warrants issued but not yet selected.

use authority_canonical::Sha256Hash;
use authority_types::Warrant;
use serde::{Deserialize, Serialize};

/// The warrants the agent layer may currently select, in issue order.
///
/// A warrant leaves the book when it is selected (whatever the gate later
/// decides) or when its window closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWarrants {
    warrants: Vec<Warrant>,
}

impl PendingWarrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, warrant: Warrant) {
        if !self.contains(&warrant.warrant_id) {
            self.warrants.push(warrant);
        }
    }

    pub fn contains(&self, warrant_id: &Sha256Hash) -> bool {
        self.get(warrant_id).is_some()
    }

    pub fn get(&self, warrant_id: &Sha256Hash) -> Option<&Warrant> {
        self.warrants.iter().find(|w| w.warrant_id == *warrant_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warrant> {
        self.warrants.iter()
    }

    pub fn len(&self) -> usize {
        self.warrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warrants.is_empty()
    }

    pub fn remove(&mut self, warrant_id: &Sha256Hash) -> Option<Warrant> {
        let index = self.warrants.iter().position(|w| w.warrant_id == *warrant_id)?;
        Some(self.warrants.remove(index))
    }

    /// Drop warrants whose window closed before `cycle`. Returns how many.
    pub fn prune_expired(&mut self, cycle: u64) -> usize {
        let before = self.warrants.len();
        self.warrants.retain(|w| w.payload.expires_step >= cycle);
        before - self.warrants.len()
    }

    /// Remove a selection from the book and return its warrants in selection
    /// order. Repeated ids yield repeated warrants.
    ///
    /// Fails with the first id not in the book, leaving the book untouched.
    pub fn take_selection(&mut self, ids: &[Sha256Hash]) -> Result<Vec<Warrant>, Sha256Hash> {
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(id) {
                Some(warrant) => selected.push(warrant.clone()),
                None => return Err(*id),
            }
        }
        self.warrants.retain(|w| !ids.contains(&w.warrant_id));
        Ok(selected)
    }
}
