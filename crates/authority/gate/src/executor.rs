use std::sync::Arc;

use authority_law::{ConsumptionRegistry, LawState, LawTransition};
use authority_types::{ClaimType, Effect, EnforcementRefusal, PolicyOp, Warrant};
use tracing::{info, warn};

use crate::destination::EffectSink;
use crate::enforcement::EnforcementGate;
use crate::error::GateError;

/// What happened to one warrant at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Executed {
        effect: Effect,
        /// Set when the effect was a policy update.
        transition: Option<LawTransition>,
    },
    Refused(EnforcementRefusal),
}

/// Applies warranted effects exactly once.
pub struct Executor {
    sink: Arc<dyn EffectSink>,
}

impl Executor {
    pub fn new(sink: Arc<dyn EffectSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn EffectSink> {
        &self.sink
    }

    /// Check, apply, consume. The registry is updated in the same call that
    /// applies the effect, so a warrant can never apply twice.
    pub fn execute(
        &self,
        warrant: &Warrant,
        law: &mut LawState,
        registry: &mut ConsumptionRegistry,
        cycle: u64,
    ) -> Result<ExecutionOutcome, GateError> {
        if let Err(refusal) = EnforcementGate::check(warrant, law, registry, cycle) {
            warn!(
                warrant_id = %warrant.warrant_id,
                claim_id = %warrant.payload.claim_id,
                refusal = refusal.code(),
                cycle,
                "enforcement refused"
            );
            return Ok(ExecutionOutcome::Refused(refusal));
        }

        let effect = Effect::for_warrant(warrant, cycle);
        self.sink.apply(&effect)?;
        let transition = Self::record(warrant, law, registry, cycle);
        info!(
            warrant_id = %warrant.warrant_id,
            claim_id = %warrant.payload.claim_id,
            scope = %warrant.payload.scope,
            cycle,
            "effect executed"
        );
        Ok(ExecutionOutcome::Executed { effect, transition })
    }

    /// Record consumption of an applied warrant and apply its law transition.
    ///
    /// Used by `execute` and when reconciling effects found at the
    /// destination without a log entry.
    pub fn record(
        warrant: &Warrant,
        law: &mut LawState,
        registry: &mut ConsumptionRegistry,
        cycle: u64,
    ) -> Option<LawTransition> {
        let payload = &warrant.payload;
        registry.consume(
            warrant.warrant_id,
            &payload.claim_id,
            payload.scope.namespace(),
            cycle,
        );
        match payload.claim_type {
            ClaimType::Command => None,
            ClaimType::PolicyUpdate => match PolicyOp::from_action(&payload.action) {
                Some(op) => Some(law.apply_policy(&op)),
                None => {
                    warn!(warrant_id = %warrant.warrant_id, "policy update without a policy op");
                    None
                }
            },
        }
    }
}
