use authority_canonical::hash_bytes;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::ids::SignerId;

/// Length of a hex-encoded ed25519 signature.
pub const SIGNATURE_HEX_LEN: usize = 128;

/// Ed25519 signing key for claims and delegations.
///
/// Keys are derived from seeds only; the kernel never draws randomness.
#[derive(Clone)]
pub struct AuthorityKey {
    signing_key: SigningKey,
}

impl AuthorityKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Key seeded with `SHA256(label)`. Used by fixtures and the CLI demo feed.
    pub fn derive(label: &str) -> Self {
        Self::from_seed(*hash_bytes(label.as_bytes()).as_bytes())
    }

    pub fn signer_id(&self) -> SignerId {
        SignerId::from_key_bytes(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign `message`, returning the lowercase hex signature.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for AuthorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityKey")
            .field("signer_id", &self.signer_id())
            .finish_non_exhaustive()
    }
}

/// Strict ed25519 verification of a hex signature.
///
/// Any decoding failure is simply `false`; callers map it to their own
/// closed reason code.
pub fn verify_signature(signer: &SignerId, message: &[u8], signature_hex: &str) -> bool {
    if signature_hex.len() != SIGNATURE_HEX_LEN {
        return false;
    }
    let mut sig_bytes = [0u8; 64];
    if hex::decode_to_slice(signature_hex, &mut sig_bytes).is_err() {
        return false;
    }
    let Ok(verifying_key) = VerifyingKey::from_bytes(&signer.key_bytes()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(message, &signature).is_ok()
}
