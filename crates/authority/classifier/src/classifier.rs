use std::sync::Arc;

use authority_canonical::{hash_bytes, Sha256Hash};
use authority_law::{KernelConfig, LawState};
use authority_types::{Classification, ProvenanceBundle};
use tracing::{debug, warn};

use crate::decode::decode_bundle;
use crate::stages::{default_stages, CheckContext, CheckStage};

/// Outcome of classifying one raw bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedBundle {
    /// `SHA256(raw bytes)`.
    pub bundle_hash: Sha256Hash,
    pub classification: Classification,
    /// The decoded bundle, present whenever decoding got that far.
    pub bundle: Option<ProvenanceBundle>,
}

impl ClassifiedBundle {
    /// The decoded bundle, only if it classified `VALID`.
    pub fn admitted(&self) -> Option<&ProvenanceBundle> {
        match self.classification {
            Classification::Valid => self.bundle.as_ref(),
            _ => None,
        }
    }
}

/// Total classifier over raw ingress bytes.
///
/// Holds no mutable state: the same bytes against the same law-state and
/// cycle always produce the same outcome.
pub struct ClaimClassifier {
    config: Arc<KernelConfig>,
    stages: Vec<Box<dyn CheckStage>>,
}

impl ClaimClassifier {
    pub fn new(config: Arc<KernelConfig>) -> Self {
        Self {
            config,
            stages: default_stages(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn classify(&self, raw: &[u8], law: &LawState, cycle: u64) -> ClassifiedBundle {
        let bundle_hash = hash_bytes(raw);
        let bundle = match decode_bundle(raw, self.config.max_bundle_bytes) {
            Ok(bundle) => bundle,
            Err(classification) => {
                warn!(
                    cycle,
                    bundle = %bundle_hash,
                    outcome = %classification,
                    "bundle refused before decoding completed"
                );
                return ClassifiedBundle {
                    bundle_hash,
                    classification,
                    bundle: None,
                };
            }
        };

        let classification = self.evaluate(&bundle, law, cycle);
        if !classification.is_valid() {
            warn!(
                cycle,
                claim_id = %bundle.claim.claim_id,
                outcome = %classification,
                "claim refused"
            );
        }
        ClassifiedBundle {
            bundle_hash,
            classification,
            bundle: Some(bundle),
        }
    }

    /// Run the authorization stages over an already-decoded bundle.
    pub fn evaluate(&self, bundle: &ProvenanceBundle, law: &LawState, cycle: u64) -> Classification {
        let ctx = CheckContext {
            bundle,
            config: &self.config,
            law,
            cycle,
        };
        for stage in &self.stages {
            if let Err(reason) = stage.evaluate(&ctx) {
                debug!(
                    stage = stage.stage_name(),
                    number = stage.stage_number(),
                    reason = reason.code(),
                    "stage failed"
                );
                return Classification::Invalid(reason);
            }
        }
        debug!(claim_id = %bundle.claim.claim_id, "all stages passed");
        Classification::Valid
    }
}
