use authority_classifier::ClassifiedBundle;
use authority_types::{ProvenanceBundle, RefusalToken};

/// Result of the pre-cognitive filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The bundle classified `VALID` and may proceed to warrant issuance.
    Admitted(ProvenanceBundle),
    /// Everything else. Only the token travels further.
    Refused(RefusalToken),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// Gate applied immediately after classification.
///
/// `position` is the bundle's index within the cycle's batch, which keeps
/// tokens for identical refused bytes distinct.
pub fn precognitive_filter(classified: &ClassifiedBundle, cycle: u64, position: u64) -> Admission {
    match classified.admitted() {
        Some(bundle) => Admission::Admitted(bundle.clone()),
        None => Admission::Refused(RefusalToken::derive(
            &classified.bundle_hash,
            cycle,
            position,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authority_canonical::hash_bytes;
    use authority_types::{Classification, InvalidReason, MalformedDefect};

    #[test]
    fn non_valid_outcomes_become_tokens() {
        for classification in [
            Classification::Malformed(MalformedDefect::Empty),
            Classification::Invalid(InvalidReason::SignatureInvalid),
        ] {
            let classified = ClassifiedBundle {
                bundle_hash: hash_bytes(b"x"),
                classification,
                bundle: None,
            };
            let admission = precognitive_filter(&classified, 3, 1);
            assert_eq!(
                admission,
                Admission::Refused(RefusalToken::derive(&hash_bytes(b"x"), 3, 1))
            );
            assert!(!admission.is_admitted());
        }
    }
}
