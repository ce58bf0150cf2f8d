//! Entry-by-entry recomputation of a logged run.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use authority_audit::{
    check_link, read_entries, AuditEntry, AuditError, AuditEvent, CollapseReason,
};
use authority_canonical::{hash_bytes, Sha256Hash};
use authority_classifier::ClaimClassifier;
use authority_gate::{precognitive_filter, Admission, EnforcementGate, Executor, WarrantIssuer};
use authority_law::{KernelConfig, LawTransition, CONFIG_SCHEMA_VERSION};
use authority_types::{Effect, Warrant};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{Divergence, DivergenceKind, ReplayError};
use crate::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing read yet.
    Header,
    /// Between cycles.
    Idle,
    Ingress,
    Execution,
    Recovery,
    Collapsed,
}

/// The entry the previous one obliges.
#[derive(Debug, Clone)]
enum Awaiting {
    Nothing,
    Classification {
        position: u64,
        raw: Vec<u8>,
        bundle_hash: Sha256Hash,
    },
    Warrant(Warrant),
    LawChange(LawTransition),
    /// The claim was admitted but no warrant can be built for it.
    IssuanceFailure { claim_id: String },
}

impl Awaiting {
    fn label(&self) -> &'static str {
        match self {
            Self::Nothing => "any",
            Self::Classification { .. } => "claim_classified",
            Self::Warrant(_) => "warrant_issued",
            Self::LawChange(_) => "law_changed",
            Self::IssuanceFailure { .. } => "collapsed",
        }
    }
}

/// Result of a complete replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub entries: u64,
    /// Hash of the last entry.
    pub head: Sha256Hash,
    /// `state_hash[0..=n]`, genesis first.
    pub state_hashes: Vec<Sha256Hash>,
    /// Index of the `StepCommitted` entry for each committed cycle.
    #[serde(skip)]
    pub commit_entries: Vec<u64>,
    /// A cycle the log opened but never committed.
    pub open_cycle: Option<u64>,
    pub collapsed: Option<CollapseReason>,
}

impl ReplayReport {
    pub fn cycles(&self) -> u64 {
        self.state_hashes.len().saturating_sub(1) as u64
    }

    /// Compare against an independently recorded state-hash sequence.
    pub fn compare(&self, expected: &[Sha256Hash]) -> Result<(), Divergence> {
        let longest = self.state_hashes.len().max(expected.len());
        for cycle in 0..longest {
            let recomputed = self.state_hashes.get(cycle).copied();
            let wanted = expected.get(cycle).copied();
            if recomputed != wanted {
                let entry_index = match cycle.checked_sub(1) {
                    Some(i) => self.commit_entries.get(i).copied().unwrap_or(self.entries),
                    None => 0,
                };
                return Err(Divergence {
                    cycle: cycle as u64,
                    entry_index,
                    kind: DivergenceKind::StateHashSequence {
                        expected: wanted,
                        recomputed,
                    },
                });
            }
        }
        Ok(())
    }
}

/// Replays a log one entry at a time against frozen rules.
///
/// Nothing is taken on trust except the log's input records: raw ingress
/// bytes, the agent's selections and reconciled destination effects.
/// Classifications, refusal tokens, warrants, enforcement outcomes, law
/// transitions and every state hash are recomputed and compared.
pub struct Replayer {
    config: Arc<KernelConfig>,
    config_hash: Sha256Hash,
    classifier: ClaimClassifier,
    issuer: WarrantIssuer,
    state: RunState,
    phase: Phase,
    awaiting: Awaiting,
    queue: VecDeque<Warrant>,
    /// Budget ticks the open cycle has spent.
    iterations: u64,
    prev_entry: Sha256Hash,
    entries: u64,
    commit_entries: Vec<u64>,
}

impl Replayer {
    pub fn new(config: Arc<KernelConfig>) -> Result<Self, ReplayError> {
        Ok(Self {
            config_hash: config.config_hash()?,
            classifier: ClaimClassifier::new(config.clone()),
            issuer: WarrantIssuer::new(config.clone()),
            state: RunState::genesis(&config)?,
            config,
            phase: Phase::Header,
            awaiting: Awaiting::Nothing,
            queue: VecDeque::new(),
            iterations: 0,
            prev_entry: Sha256Hash::ZERO,
            entries: 0,
            commit_entries: Vec::new(),
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    pub fn report(&self) -> ReplayReport {
        ReplayReport {
            entries: self.entries,
            head: self.prev_entry,
            state_hashes: self.state.state_hashes.clone(),
            commit_entries: self.commit_entries.clone(),
            open_cycle: self.state.open_cycle(),
            collapsed: self.state.collapsed.clone(),
        }
    }

    /// The log had at least its header.
    pub fn finish(&self) -> Result<ReplayReport, ReplayError> {
        if self.phase == Phase::Header {
            return Err(ReplayError::MissingRunHeader);
        }
        let report = self.report();
        info!(
            entries = report.entries,
            cycles = report.cycles(),
            state_hash = %self.state.state_hash(),
            "replay complete"
        );
        Ok(report)
    }

    fn diverge(&self, entry: &AuditEntry, kind: DivergenceKind) -> ReplayError {
        let divergence = Divergence {
            cycle: entry.cycle(),
            entry_index: self.entries,
            kind,
        };
        error!(
            cycle = divergence.cycle,
            entry = divergence.entry_index,
            kind = %divergence.kind,
            "replay divergence"
        );
        ReplayError::Divergence(divergence)
    }

    fn unexpected(&self, entry: &AuditEntry, expected: &'static str) -> ReplayError {
        self.diverge(
            entry,
            DivergenceKind::UnexpectedEvent {
                expected,
                found: entry.event.kind(),
            },
        )
    }

    /// Replay one entry. The first failure is final.
    pub fn apply(&mut self, entry: &AuditEntry) -> Result<(), ReplayError> {
        match check_link(self.entries, entry, &self.prev_entry) {
            Ok(()) => {}
            Err(AuditError::ChainBroken { reason, .. }) => {
                return Err(self.diverge(entry, DivergenceKind::ChainBroken(reason)))
            }
            Err(other) => return Err(other.into()),
        }
        match self.phase {
            Phase::Collapsed => return Err(self.diverge(entry, DivergenceKind::AfterCollapse)),
            Phase::Header => match entry.event {
                AuditEvent::RunStarted { .. } => self.run_started(entry)?,
                _ => return Err(ReplayError::MissingRunHeader),
            },
            _ => {}
        }

        if let AuditEvent::StepStarted { cycle } = &entry.event {
            self.step_started(entry, *cycle)?;
        }
        let expected = self.state.next_timestamp(&self.config.run_id);
        if entry.timestamp != expected {
            return Err(self.diverge(
                entry,
                DivergenceKind::Timestamp {
                    expected,
                    found: entry.timestamp.clone(),
                },
            ));
        }

        match &entry.event {
            AuditEvent::RunStarted { .. } if self.entries > 0 => {
                return Err(self.unexpected(entry, "no second run_started"))
            }
            AuditEvent::RunStarted { .. } | AuditEvent::StepStarted { .. } => {}
            AuditEvent::BundleReceived {
                position,
                raw_hex,
                bundle_hash,
            } => self.bundle_received(entry, *position, raw_hex, bundle_hash)?,
            AuditEvent::ClaimClassified { .. } => self.claim_classified(entry)?,
            AuditEvent::WarrantIssued { warrant } => self.warrant_issued(entry, warrant)?,
            AuditEvent::ActionsSelected { warrant_ids } => {
                self.actions_selected(entry, warrant_ids)?
            }
            AuditEvent::EffectExecuted { .. } | AuditEvent::EnforcementRefused { .. } => {
                self.execution(entry)?
            }
            AuditEvent::LawChanged { transition } => self.law_changed(entry, transition)?,
            AuditEvent::EffectReconciled { effect } => self.effect_reconciled(entry, effect)?,
            AuditEvent::RecoveryStarted {
                cycle,
                entries_replayed,
            } => self.recovery_started(entry, *cycle, *entries_replayed)?,
            AuditEvent::StepCommitted { .. } => self.step_committed(entry)?,
            AuditEvent::Collapsed { cycle, collapse } => self.collapsed(entry, *cycle, collapse)?,
        }

        self.state.record(&entry.event)?;
        self.prev_entry = entry.entry_hash;
        self.entries += 1;
        Ok(())
    }

    fn run_started(&mut self, entry: &AuditEntry) -> Result<(), ReplayError> {
        if let AuditEvent::RunStarted {
            run_id,
            schema_version,
            config_hash,
            root_identity,
            seed,
        } = &entry.event
        {
            let drifted = *run_id != self.config.run_id
                || schema_version != CONFIG_SCHEMA_VERSION
                || *config_hash != self.config_hash
                || *root_identity != self.config.root_identity()?
                || *seed != self.config.seed;
            if drifted {
                return Err(ReplayError::ConfigDrift {
                    logged: *config_hash,
                    frozen: self.config_hash,
                });
            }
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    fn step_started(&mut self, entry: &AuditEntry, cycle: u64) -> Result<(), ReplayError> {
        if self.phase != Phase::Idle {
            return Err(self.unexpected(entry, "step_committed"));
        }
        let expected = self.state.last_committed() + 1;
        if cycle != expected {
            return Err(self.diverge(
                entry,
                DivergenceKind::CycleOrder {
                    expected,
                    found: cycle,
                },
            ));
        }
        self.state.begin_cycle(cycle);
        self.phase = Phase::Ingress;
        self.iterations = 0;
        debug!(cycle, "replaying cycle");
        Ok(())
    }

    fn require_settled(&self, entry: &AuditEntry, phases: &[Phase]) -> Result<(), ReplayError> {
        if !matches!(self.awaiting, Awaiting::Nothing) {
            return Err(self.unexpected(entry, self.awaiting.label()));
        }
        if !phases.contains(&self.phase) {
            return Err(self.unexpected(entry, "an entry of another phase"));
        }
        Ok(())
    }

    /// Take the awaited obligation if it is `wanted`.
    fn take_awaiting(
        &mut self,
        entry: &AuditEntry,
        wanted: &'static str,
    ) -> Result<Awaiting, ReplayError> {
        if self.awaiting.label() != wanted {
            return Err(self.unexpected(entry, self.awaiting.label()));
        }
        Ok(std::mem::replace(&mut self.awaiting, Awaiting::Nothing))
    }

    fn bundle_received(
        &mut self,
        entry: &AuditEntry,
        position: u64,
        raw_hex: &str,
        bundle_hash: &Sha256Hash,
    ) -> Result<(), ReplayError> {
        self.require_settled(entry, &[Phase::Ingress])?;
        self.iterations += 1;
        let raw = match hex::decode(raw_hex) {
            Ok(raw) if hash_bytes(&raw) == *bundle_hash => raw,
            _ => return Err(self.diverge(entry, DivergenceKind::BundleBytes)),
        };
        self.awaiting = Awaiting::Classification {
            position,
            raw,
            bundle_hash: *bundle_hash,
        };
        Ok(())
    }

    fn claim_classified(&mut self, entry: &AuditEntry) -> Result<(), ReplayError> {
        let AuditEvent::ClaimClassified {
            position,
            bundle_hash,
            claim_id,
            classification,
            refusal_token,
        } = &entry.event
        else {
            return Ok(());
        };
        let Awaiting::Classification {
            position: want_position,
            raw,
            bundle_hash: want_hash,
        } = self.take_awaiting(entry, "claim_classified")?
        else {
            return Err(self.unexpected(entry, "claim_classified"));
        };
        if *position != want_position {
            return Err(self.diverge(entry, DivergenceKind::ClassificationRecord("position")));
        }
        if *bundle_hash != want_hash {
            return Err(self.diverge(entry, DivergenceKind::BundleBytes));
        }

        let cycle = self.state.cycle;
        let classified = self.classifier.classify(&raw, &self.state.law, cycle);
        if classified.classification != *classification {
            return Err(self.diverge(
                entry,
                DivergenceKind::Classification {
                    logged: classification.clone(),
                    recomputed: classified.classification,
                },
            ));
        }
        let recomputed_id = classified.bundle.as_ref().map(|b| b.claim.claim_id.clone());
        if recomputed_id != *claim_id {
            return Err(self.diverge(entry, DivergenceKind::ClassificationRecord("claim_id")));
        }
        match precognitive_filter(&classified, cycle, want_position) {
            Admission::Admitted(bundle) => {
                if refusal_token.is_some() {
                    return Err(
                        self.diverge(entry, DivergenceKind::ClassificationRecord("refusal_token"))
                    );
                }
                self.awaiting = match self.issuer.issue(&bundle, &self.state.law, cycle) {
                    Ok(warrant) => Awaiting::Warrant(warrant),
                    Err(e) => {
                        debug!(claim_id = %bundle.claim.claim_id, error = %e, "issuance fails on replay");
                        Awaiting::IssuanceFailure {
                            claim_id: bundle.claim.claim_id.clone(),
                        }
                    }
                };
            }
            Admission::Refused(token) => {
                if *refusal_token != Some(token) {
                    return Err(
                        self.diverge(entry, DivergenceKind::ClassificationRecord("refusal_token"))
                    );
                }
            }
        }
        Ok(())
    }

    fn warrant_issued(&mut self, entry: &AuditEntry, logged: &Warrant) -> Result<(), ReplayError> {
        let Awaiting::Warrant(recomputed) = self.take_awaiting(entry, "warrant_issued")? else {
            return Err(self.unexpected(entry, "warrant_issued"));
        };
        if *logged != recomputed {
            return Err(self.diverge(
                entry,
                DivergenceKind::Warrant {
                    logged: logged.warrant_id,
                    recomputed: recomputed.warrant_id,
                },
            ));
        }
        self.state.admit(recomputed);
        Ok(())
    }

    fn actions_selected(
        &mut self,
        entry: &AuditEntry,
        warrant_ids: &[Sha256Hash],
    ) -> Result<(), ReplayError> {
        self.require_settled(entry, &[Phase::Ingress])?;
        match self.state.pending.take_selection(warrant_ids) {
            Ok(selected) => {
                self.queue = selected.into();
                self.phase = Phase::Execution;
                Ok(())
            }
            Err(warrant_id) => Err(self.diverge(
                entry,
                DivergenceKind::UnauthorizedSelection { warrant_id },
            )),
        }
    }

    fn execution(&mut self, entry: &AuditEntry) -> Result<(), ReplayError> {
        self.require_settled(entry, &[Phase::Execution])?;
        let Some(warrant) = self.queue.pop_front() else {
            return Err(self.unexpected(entry, "step_committed"));
        };
        self.iterations += 1;
        let cycle = self.state.cycle;
        let decision = EnforcementGate::check(
            &warrant,
            &self.state.law,
            &self.state.registry,
            cycle,
        );
        let mismatch = |logged: String, recomputed: String| DivergenceKind::Enforcement {
            warrant_id: warrant.warrant_id,
            logged,
            recomputed,
        };
        match (&entry.event, decision) {
            (AuditEvent::EffectExecuted { effect }, Ok(())) => {
                if *effect != Effect::for_warrant(&warrant, cycle) {
                    return Err(self.diverge(
                        entry,
                        DivergenceKind::Effect {
                            warrant_id: warrant.warrant_id,
                        },
                    ));
                }
                self.apply_effect(&warrant, cycle);
            }
            (
                AuditEvent::EnforcementRefused {
                    warrant_id,
                    claim_id,
                    refusal,
                },
                Err(recomputed),
            ) => {
                if *warrant_id != warrant.warrant_id || claim_id != warrant.claim_id() {
                    return Err(self.diverge(
                        entry,
                        DivergenceKind::Effect {
                            warrant_id: *warrant_id,
                        },
                    ));
                }
                if *refusal != recomputed {
                    return Err(self.diverge(
                        entry,
                        mismatch(refusal.code().into(), recomputed.code().into()),
                    ));
                }
            }
            (AuditEvent::EffectExecuted { .. }, Err(recomputed)) => {
                return Err(self.diverge(entry, mismatch("EXECUTED".into(), recomputed.code().into())))
            }
            (AuditEvent::EnforcementRefused { refusal, .. }, Ok(())) => {
                return Err(self.diverge(entry, mismatch(refusal.code().into(), "EXECUTED".into())))
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_effect(&mut self, warrant: &Warrant, cycle: u64) {
        let transition = Executor::record(
            warrant,
            &mut self.state.law,
            &mut self.state.registry,
            cycle,
        );
        self.state.mark_executed(warrant.warrant_id);
        if let Some(transition) = transition {
            self.awaiting = Awaiting::LawChange(transition);
        }
    }

    fn law_changed(
        &mut self,
        entry: &AuditEntry,
        logged: &LawTransition,
    ) -> Result<(), ReplayError> {
        let Awaiting::LawChange(recomputed) = self.take_awaiting(entry, "law_changed")? else {
            return Err(self.unexpected(entry, "law_changed"));
        };
        if *logged != recomputed {
            return Err(self.diverge(
                entry,
                DivergenceKind::LawTransition {
                    logged: logged.clone(),
                    recomputed,
                },
            ));
        }
        Ok(())
    }

    fn recovery_started(
        &mut self,
        entry: &AuditEntry,
        cycle: u64,
        entries_replayed: u64,
    ) -> Result<(), ReplayError> {
        if !matches!(
            self.phase,
            Phase::Ingress | Phase::Execution | Phase::Recovery
        ) {
            return Err(self.unexpected(entry, "step_started"));
        }
        if cycle != self.state.cycle || entries_replayed > self.entries {
            return Err(self.diverge(entry, DivergenceKind::RecoveryRecord));
        }
        // Whatever the crash cut short is abandoned, never resumed.
        self.awaiting = Awaiting::Nothing;
        self.queue.clear();
        self.phase = Phase::Recovery;
        Ok(())
    }

    fn effect_reconciled(&mut self, entry: &AuditEntry, effect: &Effect) -> Result<(), ReplayError> {
        self.require_settled(entry, &[Phase::Recovery])?;
        let Some(warrant) = self.state.unexecuted(&effect.warrant_id).cloned() else {
            return Err(self.diverge(
                entry,
                DivergenceKind::UnknownWarrant {
                    warrant_id: effect.warrant_id,
                },
            ));
        };
        if *effect != Effect::for_warrant(&warrant, effect.cycle) {
            return Err(self.diverge(
                entry,
                DivergenceKind::Effect {
                    warrant_id: effect.warrant_id,
                },
            ));
        }
        self.apply_effect(&warrant, effect.cycle);
        Ok(())
    }

    fn step_committed(&mut self, entry: &AuditEntry) -> Result<(), ReplayError> {
        let AuditEvent::StepCommitted {
            cycle,
            stream_hashes,
            state_hash,
        } = &entry.event
        else {
            return Ok(());
        };
        self.require_settled(entry, &[Phase::Execution, Phase::Recovery])?;
        if !self.queue.is_empty() {
            return Err(self.unexpected(entry, "effect_executed"));
        }
        if *cycle != self.state.cycle {
            return Err(self.diverge(
                entry,
                DivergenceKind::CycleOrder {
                    expected: self.state.cycle,
                    found: *cycle,
                },
            ));
        }
        let (hashes, recomputed) = self.state.commit();
        if hashes != *stream_hashes {
            return Err(self.diverge(entry, DivergenceKind::StreamHashes));
        }
        if recomputed != *state_hash {
            return Err(self.diverge(
                entry,
                DivergenceKind::StateHash {
                    logged: *state_hash,
                    recomputed,
                },
            ));
        }
        self.commit_entries.push(self.entries);
        self.phase = Phase::Idle;
        Ok(())
    }

    fn collapsed(
        &mut self,
        entry: &AuditEntry,
        cycle: u64,
        collapse: &CollapseReason,
    ) -> Result<(), ReplayError> {
        let consistent = self.state.open
            && cycle == self.state.cycle
            && match (&self.awaiting, collapse) {
                (
                    Awaiting::IssuanceFailure { claim_id },
                    CollapseReason::IssuanceFailed { claim_id: logged, .. },
                ) => claim_id == logged,
                (Awaiting::Nothing, collapse) => self.collapse_fits(collapse),
                _ => false,
            };
        if !consistent {
            return Err(self.diverge(entry, DivergenceKind::CollapseRecord));
        }
        self.state.collapsed = Some(collapse.clone());
        self.phase = Phase::Collapsed;
        Ok(())
    }

    /// Whether a settled cycle could have collapsed for `collapse` here.
    ///
    /// Budgets are charged one tick per received bundle and one per
    /// selected warrant, so a budget collapse must sit where the kernel was
    /// about to spend the next tick.
    fn collapse_fits(&self, collapse: &CollapseReason) -> bool {
        let budget = &self.config.step_budget;
        let ticking = match self.phase {
            Phase::Ingress => true,
            Phase::Execution => !self.queue.is_empty(),
            _ => false,
        };
        match collapse {
            CollapseReason::IterationBudget { limit } => {
                ticking && *limit == budget.max_iterations && self.iterations == *limit
            }
            CollapseReason::WallClockBudget { limit_ms } => {
                ticking
                    && *limit_ms == budget.max_wall_clock_ms
                    && self.iterations < budget.max_iterations
            }
            CollapseReason::UnauthorizedSelection { warrant_id } => {
                self.phase == Phase::Ingress && !self.state.pending.contains(warrant_id)
            }
            CollapseReason::UnknownDestinationEffect { .. } => self.phase == Phase::Recovery,
            CollapseReason::ExecutionFailed { warrant_id, .. } => {
                self.phase == Phase::Execution
                    && self.queue.front().map(|w| w.warrant_id) == Some(*warrant_id)
            }
            CollapseReason::IssuanceFailed { .. } => false,
        }
    }
}

/// Replay `entries` under `config`.
pub fn replay(entries: &[AuditEntry], config: Arc<KernelConfig>) -> Result<ReplayReport, ReplayError> {
    let mut replayer = Replayer::new(config)?;
    for entry in entries {
        replayer.apply(entry)?;
    }
    replayer.finish()
}

/// Replay the log file at `path` under `config`.
pub fn replay_file(path: &Path, config: Arc<KernelConfig>) -> Result<ReplayReport, ReplayError> {
    let entries = read_entries(path)?;
    replay(&entries, config)
}
