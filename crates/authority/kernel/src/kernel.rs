//! The kernel instance.

use std::sync::Arc;
use std::time::Instant;

use authority_audit::{AuditEntry, AuditEvent, AuditLog, CollapseReason};
use authority_canonical::{hash_bytes, Sha256Hash};
use authority_classifier::ClaimClassifier;
use authority_gate::{
    precognitive_filter, Admission, EffectSink, ExecutionOutcome, Executor, WarrantIssuer,
};
use authority_law::{ConsumptionRegistry, KernelConfig, LawState, CONFIG_SCHEMA_VERSION};
use authority_replay::{Replayer, RunState};
use authority_types::Effect;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::KernelError;
use crate::order::processing_order;
use crate::selector::{AgentView, SelectAll, Selector};

/// Counts for one committed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub cycle: u64,
    pub received: usize,
    pub admitted: usize,
    pub refused: usize,
    pub executed: usize,
    pub denied: usize,
    pub state_hash: Sha256Hash,
}

impl StepReport {
    fn new(cycle: u64, received: usize) -> Self {
        Self {
            cycle,
            received,
            admitted: 0,
            refused: 0,
            executed: 0,
            denied: 0,
            state_hash: Sha256Hash::ZERO,
        }
    }
}

/// Per-step iteration and wall-clock accounting.
struct Budget {
    started: Instant,
    iterations: u64,
    max_iterations: u64,
    max_wall_clock_ms: u64,
}

impl Budget {
    fn start(config: &KernelConfig) -> Self {
        Self {
            started: Instant::now(),
            iterations: 0,
            max_iterations: config.step_budget.max_iterations,
            max_wall_clock_ms: config.step_budget.max_wall_clock_ms,
        }
    }

    fn tick(&mut self) -> Result<(), CollapseReason> {
        self.iterations += 1;
        if self.iterations > self.max_iterations {
            return Err(CollapseReason::IterationBudget {
                limit: self.max_iterations,
            });
        }
        if self.started.elapsed().as_millis() > u128::from(self.max_wall_clock_ms) {
            return Err(CollapseReason::WallClockBudget {
                limit_ms: self.max_wall_clock_ms,
            });
        }
        Ok(())
    }
}

/// Single-writer authority kernel.
///
/// Each [`Kernel::step`] takes one batch of raw bundles through
/// classification, issuance, the agent's selection and enforcement, logging
/// every decision before acting on it, and commits the cycle's state hash.
pub struct Kernel {
    config: Arc<KernelConfig>,
    classifier: ClaimClassifier,
    issuer: WarrantIssuer,
    executor: Executor,
    log: Arc<dyn AuditLog>,
    selector: Box<dyn Selector>,
    state: RunState,
    halted: bool,
}

impl Kernel {
    /// Open a run on `log`.
    ///
    /// An empty log starts a new run. Otherwise the log is replayed under
    /// `config` to rebuild law-state, consumption and the state-hash head;
    /// effects found at `destination` without an execution entry are
    /// reconciled into the log, and an interrupted cycle is closed, before
    /// any new step is accepted.
    pub fn open(
        config: KernelConfig,
        log: Arc<dyn AuditLog>,
        destination: Arc<dyn EffectSink>,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        let config = Arc::new(config);
        let entries = log.entries()?;

        let state = if entries.is_empty() {
            RunState::genesis(&config)?
        } else {
            let mut replayer = Replayer::new(config.clone())?;
            for entry in &entries {
                replayer.apply(entry)?;
            }
            replayer.finish()?;
            replayer.into_state()
        };

        let mut kernel = Self {
            classifier: ClaimClassifier::new(config.clone()),
            issuer: WarrantIssuer::new(config.clone()),
            executor: Executor::new(destination),
            log,
            selector: Box::new(SelectAll),
            state,
            halted: false,
            config,
        };

        if entries.is_empty() {
            kernel.append(AuditEvent::RunStarted {
                run_id: kernel.config.run_id.clone(),
                schema_version: CONFIG_SCHEMA_VERSION.to_string(),
                config_hash: kernel.config.config_hash()?,
                root_identity: kernel.config.root_identity()?,
                seed: kernel.config.seed,
            })?;
            info!(
                run_id = %kernel.config.run_id,
                genesis = %kernel.state.state_hash(),
                "run started"
            );
        } else {
            if let Some(reason) = kernel.state.collapsed.clone() {
                error!(reason = %reason, "run already collapsed");
                return Err(KernelError::Collapse(reason));
            }
            kernel.recover(entries.len() as u64)?;
            info!(
                run_id = %kernel.config.run_id,
                cycle = kernel.state.last_committed(),
                state_hash = %kernel.state.state_hash(),
                "run resumed"
            );
        }
        Ok(kernel)
    }

    pub fn with_selector(mut self, selector: impl Selector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn law(&self) -> &LawState {
        &self.state.law
    }

    pub fn registry(&self) -> &ConsumptionRegistry {
        &self.state.registry
    }

    /// Last committed cycle.
    pub fn cycle(&self) -> u64 {
        self.state.last_committed()
    }

    pub fn state_hash(&self) -> Sha256Hash {
        self.state.state_hash()
    }

    /// `state_hash[0..=cycle]`.
    pub fn state_hashes(&self) -> &[Sha256Hash] {
        &self.state.state_hashes
    }

    pub fn pending_warrants(&self) -> usize {
        self.state.pending.len()
    }

    pub fn collapsed(&self) -> Option<&CollapseReason> {
        self.state.collapsed.as_ref()
    }

    fn append(&mut self, event: AuditEvent) -> Result<AuditEntry, KernelError> {
        let timestamp = self.state.next_timestamp(&self.config.run_id);
        let entry = self.log.append(timestamp, event)?;
        self.state.record(&entry.event)?;
        Ok(entry)
    }

    /// Log the collapse and stop for good.
    fn collapse(&mut self, reason: CollapseReason) -> KernelError {
        let cycle = self.state.cycle;
        error!(cycle, reason = %reason, "collapse");
        if let Err(e) = self.append(AuditEvent::Collapsed {
            cycle,
            collapse: reason.clone(),
        }) {
            self.halted = true;
            return e;
        }
        self.state.collapsed = Some(reason.clone());
        KernelError::Collapse(reason)
    }

    fn commit(&mut self) -> Result<Sha256Hash, KernelError> {
        let cycle = self.state.cycle;
        let (stream_hashes, state_hash) = self.state.commit();
        self.append(AuditEvent::StepCommitted {
            cycle,
            stream_hashes,
            state_hash,
        })?;
        info!(cycle, state_hash = %state_hash, "step committed");
        Ok(state_hash)
    }

    fn recover(&mut self, entries_replayed: u64) -> Result<(), KernelError> {
        let unlogged: Vec<Effect> = self
            .executor
            .sink()
            .effects()?
            .into_iter()
            .filter(|e| !self.state.executed.contains(&e.warrant_id))
            .collect();
        if self.state.open_cycle().is_none() && unlogged.is_empty() {
            return Ok(());
        }

        let cycle = match self.state.open_cycle() {
            Some(cycle) => cycle,
            None => {
                let cycle = self.state.last_committed() + 1;
                self.state.begin_cycle(cycle);
                self.append(AuditEvent::StepStarted { cycle })?;
                cycle
            }
        };
        warn!(cycle, unlogged = unlogged.len(), "recovering interrupted cycle");
        self.append(AuditEvent::RecoveryStarted {
            cycle,
            entries_replayed,
        })?;

        for effect in unlogged {
            let warrant = match self.state.unexecuted(&effect.warrant_id) {
                Some(w) if Effect::for_warrant(w, effect.cycle) == effect => w.clone(),
                _ => {
                    return Err(self.collapse(CollapseReason::UnknownDestinationEffect {
                        warrant_id: effect.warrant_id,
                    }))
                }
            };
            let transition = Executor::record(
                &warrant,
                &mut self.state.law,
                &mut self.state.registry,
                effect.cycle,
            );
            self.state.mark_executed(warrant.warrant_id);
            info!(warrant_id = %warrant.warrant_id, cycle = effect.cycle, "effect reconciled");
            self.append(AuditEvent::EffectReconciled { effect })?;
            if let Some(transition) = transition {
                self.append(AuditEvent::LawChanged { transition })?;
            }
        }
        self.commit()?;
        Ok(())
    }

    /// Run one step over `bundles`, in the order given by the feed.
    ///
    /// Collapse is terminal: the run refuses every later step. A failure
    /// to issue a warrant or to apply an effect is a collapse. Any other
    /// error, such as the log itself failing, halts the kernel; reopen it
    /// from the log to continue.
    pub fn step(&mut self, bundles: &[Vec<u8>]) -> Result<StepReport, KernelError> {
        if let Some(reason) = &self.state.collapsed {
            return Err(KernelError::Collapse(reason.clone()));
        }
        if self.halted {
            return Err(KernelError::Halted);
        }
        let result = self.run_step(bundles);
        if let Err(e) = &result {
            if !matches!(e, KernelError::Collapse(_)) {
                error!(error = %e, "kernel halted");
                self.halted = true;
            }
        }
        result
    }

    fn run_step(&mut self, bundles: &[Vec<u8>]) -> Result<StepReport, KernelError> {
        let mut budget = Budget::start(&self.config);
        let cycle = self.state.last_committed() + 1;
        let mut report = StepReport::new(cycle, bundles.len());

        self.state.begin_cycle(cycle);
        self.append(AuditEvent::StepStarted { cycle })?;
        debug!(cycle, bundles = bundles.len(), "step started");

        // Ingress: every bundle is logged and classified; only VALID ones
        // become warrants.
        let mut refusals = Vec::new();
        for position in processing_order(self.config.seed, cycle, bundles.len()) {
            if let Err(reason) = budget.tick() {
                return Err(self.collapse(reason));
            }
            let raw = &bundles[position];
            let position = position as u64;
            self.append(AuditEvent::BundleReceived {
                position,
                raw_hex: hex::encode(raw),
                bundle_hash: hash_bytes(raw),
            })?;

            let classified = self.classifier.classify(raw, &self.state.law, cycle);
            let admission = precognitive_filter(&classified, cycle, position);
            self.append(AuditEvent::ClaimClassified {
                position,
                bundle_hash: classified.bundle_hash,
                claim_id: classified.bundle.as_ref().map(|b| b.claim.claim_id.clone()),
                classification: classified.classification.clone(),
                refusal_token: match &admission {
                    Admission::Refused(token) => Some(*token),
                    Admission::Admitted(_) => None,
                },
            })?;

            match admission {
                Admission::Admitted(bundle) => {
                    let warrant = match self.issuer.issue(&bundle, &self.state.law, cycle) {
                        Ok(warrant) => warrant,
                        Err(e) => {
                            return Err(self.collapse(CollapseReason::IssuanceFailed {
                                claim_id: bundle.claim.claim_id.clone(),
                                error: e.to_string(),
                            }))
                        }
                    };
                    self.state.admit(warrant.clone());
                    self.append(AuditEvent::WarrantIssued { warrant })?;
                    report.admitted += 1;
                }
                Admission::Refused(token) => {
                    refusals.push(token);
                    report.refused += 1;
                }
            }
        }

        // Selection.
        let view = AgentView::new(cycle, &self.state.pending, refusals);
        let selection = self.selector.select(&view);
        let selected = match self.state.pending.take_selection(&selection) {
            Ok(selected) => selected,
            Err(warrant_id) => {
                return Err(self.collapse(CollapseReason::UnauthorizedSelection { warrant_id }))
            }
        };
        self.append(AuditEvent::ActionsSelected {
            warrant_ids: selection,
        })?;

        // Enforcement and effect.
        for warrant in selected {
            if let Err(reason) = budget.tick() {
                return Err(self.collapse(reason));
            }
            let outcome = match self.executor.execute(
                &warrant,
                &mut self.state.law,
                &mut self.state.registry,
                cycle,
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    return Err(self.collapse(CollapseReason::ExecutionFailed {
                        warrant_id: warrant.warrant_id,
                        error: e.to_string(),
                    }))
                }
            };
            match outcome {
                ExecutionOutcome::Executed { effect, transition } => {
                    self.state.mark_executed(warrant.warrant_id);
                    self.append(AuditEvent::EffectExecuted { effect })?;
                    if let Some(transition) = transition {
                        info!(cycle, transition = ?transition, "law changed");
                        self.append(AuditEvent::LawChanged { transition })?;
                    }
                    report.executed += 1;
                }
                ExecutionOutcome::Refused(refusal) => {
                    self.append(AuditEvent::EnforcementRefused {
                        warrant_id: warrant.warrant_id,
                        claim_id: warrant.payload.claim_id.clone(),
                        refusal,
                    })?;
                    report.denied += 1;
                }
            }
        }

        report.state_hash = self.commit()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authority_audit::{verify_entries, MemoryAuditLog};
    use authority_gate::{GateError, MemoryDestination};
    use authority_replay::replay;
    use parking_lot::Mutex;
    use authority_types::{
        ActionRequest, AuthorityClaim, AuthorityKey, ClaimType, EnforcementRefusal,
        LogicalTimestamp, ProvenanceBundle, Scope,
    };

    fn root() -> AuthorityKey {
        AuthorityKey::derive("root")
    }

    fn config() -> KernelConfig {
        KernelConfig::new("run", [root().signer_id()], ["ops"])
    }

    fn bundle(claim_id: &str, scope: &str, action: ActionRequest, kind: ClaimType, step: u64) -> Vec<u8> {
        let claim = AuthorityClaim::builder(claim_id, root().signer_id(), Scope::parse(scope).unwrap(), action)
            .claim_type(kind)
            .timestamp(LogicalTimestamp::new("run", step, 0))
            .build()
            .sign(&root())
            .unwrap();
        ProvenanceBundle::direct(claim).to_wire().unwrap().into_bytes()
    }

    fn command(claim_id: &str, step: u64) -> Vec<u8> {
        bundle(claim_id, "ops/restart", ActionRequest::new("restart", claim_id), ClaimType::Command, step)
    }

    fn open(log: &Arc<MemoryAuditLog>, dest: &MemoryDestination) -> Kernel {
        Kernel::open(config(), log.clone(), Arc::new(dest.clone())).unwrap()
    }

    #[test]
    fn step_executes_valid_and_refuses_the_rest() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let mut kernel = open(&log, &dest);

        let report = kernel
            .step(&[command("c-1", 1), b"".to_vec(), b"{\"claim\":".to_vec()])
            .unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!((report.admitted, report.refused, report.executed), (1, 2, 1));
        assert_eq!(dest.len(), 1);
        assert_eq!(kernel.cycle(), 1);

        let entries = log.entries().unwrap();
        verify_entries(&entries).unwrap();
        let replayed = replay(&entries, Arc::new(config())).unwrap();
        assert_eq!(replayed.state_hashes, kernel.state_hashes());
    }

    #[test]
    fn resubmitted_claim_is_consumed_not_reexecuted() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let mut kernel = open(&log, &dest);
        kernel.step(&[command("c-1", 1)]).unwrap();
        let again = kernel.step(&[command("c-1", 1)]).unwrap();
        assert_eq!((again.admitted, again.executed, again.denied), (1, 0, 1));
        assert_eq!(dest.len(), 1);

        let refused = log.entries().unwrap().into_iter().any(|e| {
            matches!(
                e.event,
                AuditEvent::EnforcementRefused {
                    refusal: EnforcementRefusal::Consumed,
                    ..
                }
            )
        });
        assert!(refused);
    }

    #[test]
    fn duplicate_selection_is_refused_once_executed() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let mut kernel = open(&log, &dest).with_selector(|view: &AgentView| {
            view.actions
                .iter()
                .flat_map(|a| [a.warrant_id, a.warrant_id])
                .collect()
        });
        let report = kernel.step(&[command("c-1", 1)]).unwrap();
        assert_eq!((report.executed, report.denied), (1, 1));
        assert_eq!(dest.len(), 1);
        replay(&log.entries().unwrap(), Arc::new(config())).unwrap();
    }

    #[test]
    fn unauthorized_selection_collapses_for_good() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let mut kernel = open(&log, &dest)
            .with_selector(|_: &AgentView| vec![hash_bytes(b"made up")]);
        let err = kernel.step(&[command("c-1", 1)]).unwrap_err();
        assert!(matches!(
            err,
            KernelError::Collapse(CollapseReason::UnauthorizedSelection { .. })
        ));
        assert!(matches!(kernel.step(&[]), Err(KernelError::Collapse(_))));
        assert!(dest.is_empty());

        let entries = log.entries().unwrap();
        let report = replay(&entries, Arc::new(config())).unwrap();
        assert!(report.collapsed.is_some());
        assert!(matches!(
            Kernel::open(config(), log.clone(), Arc::new(dest.clone())),
            Err(KernelError::Collapse(_))
        ));
    }

    #[test]
    fn iteration_budget_collapses() {
        let mut cfg = config();
        cfg.step_budget.max_iterations = 2;
        let log = Arc::new(MemoryAuditLog::new());
        let mut kernel = Kernel::open(cfg.clone(), log.clone(), Arc::new(MemoryDestination::new())).unwrap();
        let err = kernel
            .step(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Collapse(CollapseReason::IterationBudget { limit: 2 })
        ));
        replay(&log.entries().unwrap(), Arc::new(cfg)).unwrap();
    }

    struct FullDisk;

    impl EffectSink for FullDisk {
        fn apply(&self, _: &Effect) -> Result<(), GateError> {
            Err(GateError::Destination("disk full".into()))
        }

        fn effects(&self) -> Result<Vec<Effect>, GateError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn destination_failure_is_a_logged_collapse() {
        let log = Arc::new(MemoryAuditLog::new());
        let mut kernel = Kernel::open(config(), log.clone(), Arc::new(FullDisk)).unwrap();
        let err = kernel.step(&[command("c-1", 1)]).unwrap_err();
        let (warrant_id, error) = match err {
            KernelError::Collapse(CollapseReason::ExecutionFailed { warrant_id, error }) => {
                (warrant_id, error)
            }
            other => panic!("expected execution collapse, got {other:?}"),
        };
        assert!(error.contains("disk full"));
        assert!(matches!(kernel.step(&[]), Err(KernelError::Collapse(_))));

        let entries = log.entries().unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.event.kind(), "collapsed");
        assert!(last.witnesses.contains(&warrant_id));
        verify_entries(&entries).unwrap();

        let report = replay(&entries, Arc::new(config())).unwrap();
        assert!(matches!(
            report.collapsed,
            Some(CollapseReason::ExecutionFailed { .. })
        ));
        assert!(matches!(
            Kernel::open(config(), log.clone(), Arc::new(FullDisk)),
            Err(KernelError::Collapse(_))
        ));
    }

    #[test]
    fn policy_update_advances_epoch_for_later_claims() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let mut kernel = open(&log, &dest);
        let advance = bundle(
            "p-1",
            "law/epoch",
            ActionRequest::new("advance_epoch", ""),
            ClaimType::PolicyUpdate,
            1,
        );
        kernel.step(&[advance]).unwrap();
        assert_eq!(kernel.law().epoch(), 1);
        let law_entries = log
            .entries()
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e.event, AuditEvent::LawChanged { .. }))
            .count();
        assert_eq!(law_entries, 1);
        replay(&log.entries().unwrap(), Arc::new(config())).unwrap();
    }

    #[test]
    fn reopening_resumes_at_the_same_state() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let head = {
            let mut kernel = open(&log, &dest);
            kernel.step(&[command("c-1", 1)]).unwrap();
            kernel.state_hash()
        };
        let mut kernel = open(&log, &dest);
        assert_eq!(kernel.state_hash(), head);
        assert_eq!(kernel.cycle(), 1);
        let report = kernel.step(&[command("c-2", 2)]).unwrap();
        assert_eq!(report.cycle, 2);
        assert_eq!(dest.len(), 2);
    }

    #[test]
    fn unlogged_destination_effect_is_reconciled() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        {
            // Issue a warrant but never let the agent select it.
            let mut kernel = open(&log, &dest).with_selector(|_: &AgentView| Vec::new());
            kernel.step(&[command("c-1", 1)]).unwrap();
        }
        // An effect for that warrant reaches the destination with no log entry.
        let warrant = log
            .entries()
            .unwrap()
            .into_iter()
            .find_map(|e| match e.event {
                AuditEvent::WarrantIssued { warrant } => Some(warrant),
                _ => None,
            })
            .unwrap();
        dest.apply(&Effect::for_warrant(&warrant, 1)).unwrap();

        let kernel = open(&log, &dest);
        assert_eq!(kernel.cycle(), 2);
        assert!(kernel.registry().is_warrant_consumed(&warrant.warrant_id));
        let entries = log.entries().unwrap();
        assert!(entries
            .iter()
            .any(|e| matches!(e.event, AuditEvent::EffectReconciled { .. })));
        let report = replay(&entries, Arc::new(config())).unwrap();
        assert_eq!(report.state_hashes, kernel.state_hashes());
    }

    #[test]
    fn unknown_destination_effect_collapses() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        {
            let mut kernel = open(&log, &dest);
            kernel.step(&[]).unwrap();
        }
        let stray = Effect {
            warrant_id: hash_bytes(b"stray"),
            claim_id: "x".into(),
            claim_type: ClaimType::Command,
            scope: Scope::parse("ops/restart").unwrap(),
            action: ActionRequest::new("restart", "svc"),
            cycle: 1,
        };
        dest.apply(&stray).unwrap();
        assert!(matches!(
            Kernel::open(config(), log.clone(), Arc::new(dest.clone())),
            Err(KernelError::Collapse(CollapseReason::UnknownDestinationEffect { .. }))
        ));
        replay(&log.entries().unwrap(), Arc::new(config())).unwrap();
    }

    #[test]
    fn view_hides_refused_claims() {
        let log = Arc::new(MemoryAuditLog::new());
        let dest = MemoryDestination::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut kernel = open(&log, &dest).with_selector(move |view: &AgentView| {
            *sink.lock() = Some(view.clone());
            Vec::new()
        });
        kernel.step(&[command("c-1", 1), b"junk".to_vec()]).unwrap();
        let view = seen.lock().clone().unwrap();
        assert_eq!(view.actions.len(), 1);
        assert_eq!(view.actions[0].claim_id, "c-1");
        assert_eq!(view.refusals.len(), 1);
    }
}
