//! Structure, required-field and type checks: raw bytes to a typed bundle.

use std::collections::{BTreeMap, BTreeSet};

use authority_types::{
    ActionRequest, AmbiguitySubtype, AuthorityClaim, ClaimType, Classification, Delegation,
    LogicalTimestamp, MalformedDefect, ProvenanceBundle, Scope, SignatureArtifact, SignerId,
    SIGNATURE_HEX_LEN,
};
use serde_json::{Map, Value};

use crate::strict::{parse_strict, StrictError};

type Decoded<T> = Result<T, Classification>;

struct Shape {
    required: &'static [&'static str],
    optional: &'static [&'static str],
}

const BUNDLE: Shape = Shape {
    required: &["claim"],
    optional: &["delegation"],
};

const CLAIM: Shape = Shape {
    required: &[
        "claim_id",
        "claim_type",
        "claimed_actor_id",
        "scope",
        "action",
        "nonce",
        "source_id",
        "timestamp",
    ],
    optional: &["delegation_id", "epoch", "artifact"],
};

const ACTION: Shape = Shape {
    required: &["op", "target"],
    optional: &["args"],
};

const TIMESTAMP: Shape = Shape {
    required: &["run_id", "step", "index"],
    optional: &[],
};

const ARTIFACT: Shape = Shape {
    required: &["signer_id", "signature"],
    optional: &[],
};

const DELEGATION: Shape = Shape {
    required: &[
        "delegation_id",
        "root_signer_id",
        "delegate_signer_id",
        "epoch",
        "scope_set",
        "signature",
    ],
    optional: &[],
};

/// Decode raw ingress bytes into a bundle, or the outcome that stops it.
///
/// Covers the first three check groups. Everything that gets past here is
/// well-typed; authorization is left to the stages.
pub fn decode_bundle(raw: &[u8], max_bytes: u64) -> Decoded<ProvenanceBundle> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(malformed(MalformedDefect::Empty));
    }
    if raw.len() as u64 > max_bytes {
        return Err(malformed(MalformedDefect::Oversized));
    }
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        // No error length means the input stopped mid-sequence.
        Err(e) if e.error_len().is_none() => {
            return Err(Classification::Ambiguous(AmbiguitySubtype::PartialDecode))
        }
        Err(_) => return Err(malformed(MalformedDefect::InvalidEncoding)),
    };
    let value = parse_strict(text).map_err(|e| match e {
        StrictError::Eof => Classification::Ambiguous(AmbiguitySubtype::TruncatedBundle),
        StrictError::DuplicateKey => Classification::Ambiguous(AmbiguitySubtype::ConflictingParse),
        StrictError::Syntax => malformed(MalformedDefect::Syntax),
    })?;
    let root = value
        .as_object()
        .ok_or_else(|| malformed(MalformedDefect::NotAnObject))?;

    check_presence(root)?;
    typed_bundle(root)
}

fn malformed(defect: MalformedDefect) -> Classification {
    Classification::Malformed(defect)
}

fn check_shape(obj: &Map<String, Value>, shape: &Shape, path: &str) -> Decoded<()> {
    for field in shape.required {
        if !obj.contains_key(*field) {
            return Err(malformed(MalformedDefect::missing(join(path, field))));
        }
    }
    for key in obj.keys() {
        let known = shape.required.contains(&key.as_str()) || shape.optional.contains(&key.as_str());
        if !known {
            return Err(malformed(MalformedDefect::unknown(join(path, key))));
        }
    }
    Ok(())
}

/// Required-field pass over every nested object, before any type is checked.
/// Children that are not objects are left for the type pass.
fn check_presence(root: &Map<String, Value>) -> Decoded<()> {
    check_shape(root, &BUNDLE, "")?;
    if let Some(claim) = root.get("claim").and_then(Value::as_object) {
        check_shape(claim, &CLAIM, "claim")?;
        if let Some(action) = claim.get("action").and_then(Value::as_object) {
            check_shape(action, &ACTION, "claim.action")?;
        }
        if let Some(ts) = claim.get("timestamp").and_then(Value::as_object) {
            check_shape(ts, &TIMESTAMP, "claim.timestamp")?;
        }
        if let Some(artifact) = claim.get("artifact").and_then(Value::as_object) {
            check_shape(artifact, &ARTIFACT, "claim.artifact")?;
        }
    }
    if let Some(delegation) = root.get("delegation").and_then(Value::as_object) {
        check_shape(delegation, &DELEGATION, "delegation")?;
    }
    Ok(())
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

/// Reads typed fields out of one object, naming the full path on failure.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    path: &'static str,
}

impl<'a> Fields<'a> {
    fn new(obj: &'a Map<String, Value>, path: &'static str) -> Self {
        Self { obj, path }
    }

    fn type_error(&self, field: &str) -> Classification {
        malformed(MalformedDefect::field_type(join(self.path, field)))
    }

    fn value(&self, field: &str) -> Decoded<&'a Value> {
        self.obj
            .get(field)
            .ok_or_else(|| malformed(MalformedDefect::missing(join(self.path, field))))
    }

    fn object(&self, field: &str) -> Decoded<&'a Map<String, Value>> {
        self.value(field)?
            .as_object()
            .ok_or_else(|| self.type_error(field))
    }

    fn string(&self, field: &str) -> Decoded<&'a str> {
        self.value(field)?
            .as_str()
            .ok_or_else(|| self.type_error(field))
    }

    fn non_empty(&self, field: &str) -> Decoded<String> {
        match self.string(field)? {
            "" => Err(self.type_error(field)),
            s => Ok(s.to_string()),
        }
    }

    fn uint(&self, field: &str) -> Decoded<u64> {
        self.value(field)?
            .as_u64()
            .ok_or_else(|| self.type_error(field))
    }

    fn signer(&self, field: &str) -> Decoded<SignerId> {
        SignerId::parse(self.string(field)?).map_err(|_| self.type_error(field))
    }

    fn scope(&self, field: &str) -> Decoded<Scope> {
        Scope::parse(self.string(field)?).map_err(|_| self.type_error(field))
    }

    /// Full-length lowercase hex, or a clean truncation of one.
    fn signature(&self, field: &str) -> Decoded<String> {
        let sig = self.string(field)?;
        let lower_hex = sig
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if lower_hex && sig.len() == SIGNATURE_HEX_LEN {
            return Ok(sig.to_string());
        }
        if lower_hex && !sig.is_empty() && sig.len() < SIGNATURE_HEX_LEN && sig.len() % 2 == 0 {
            return Err(Classification::Ambiguous(AmbiguitySubtype::TruncatedArtifact));
        }
        Err(self.type_error(field))
    }

    fn optional(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field)
    }
}

fn typed_bundle(root: &Map<String, Value>) -> Decoded<ProvenanceBundle> {
    let fields = Fields::new(root, "");
    let claim = typed_claim(fields.object("claim")?)?;
    let delegation = match fields.optional("delegation") {
        None => None,
        Some(v) => Some(typed_delegation(
            v.as_object().ok_or_else(|| fields.type_error("delegation"))?,
        )?),
    };
    Ok(ProvenanceBundle { claim, delegation })
}

fn typed_claim(obj: &Map<String, Value>) -> Decoded<AuthorityClaim> {
    let f = Fields::new(obj, "claim");

    let claim_id = f.non_empty("claim_id")?;
    let claim_type =
        ClaimType::parse(f.string("claim_type")?).ok_or_else(|| f.type_error("claim_type"))?;
    let claimed_actor_id = f.signer("claimed_actor_id")?;
    let scope = f.scope("scope")?;
    let action = typed_action(f.object("action")?)?;
    let nonce = f.non_empty("nonce")?;
    let source_id = f.non_empty("source_id")?;
    let timestamp = typed_timestamp(f.object("timestamp")?)?;

    let delegation_id = match f.optional("delegation_id") {
        None => None,
        Some(_) => Some(f.non_empty("delegation_id")?),
    };
    let epoch = match f.optional("epoch") {
        None => None,
        Some(_) => Some(f.uint("epoch")?),
    };
    let artifact = match f.optional("artifact") {
        None => None,
        Some(v) => {
            let obj = v.as_object().ok_or_else(|| f.type_error("artifact"))?;
            let a = Fields::new(obj, "claim.artifact");
            Some(SignatureArtifact {
                signer_id: a.signer("signer_id")?,
                signature: a.signature("signature")?,
            })
        }
    };

    Ok(AuthorityClaim {
        claim_id,
        claim_type,
        claimed_actor_id,
        scope,
        action,
        nonce,
        source_id,
        timestamp,
        delegation_id,
        epoch,
        artifact,
    })
}

fn typed_action(obj: &Map<String, Value>) -> Decoded<ActionRequest> {
    let f = Fields::new(obj, "claim.action");
    let op = f.non_empty("op")?;
    let target = f.string("target")?.to_string();
    let mut args = BTreeMap::new();
    if let Some(v) = f.optional("args") {
        let map = v.as_object().ok_or_else(|| f.type_error("args"))?;
        for (key, value) in map {
            let value = value.as_str().ok_or_else(|| f.type_error("args"))?;
            args.insert(key.clone(), value.to_string());
        }
    }
    Ok(ActionRequest { op, target, args })
}

fn typed_timestamp(obj: &Map<String, Value>) -> Decoded<LogicalTimestamp> {
    let f = Fields::new(obj, "claim.timestamp");
    Ok(LogicalTimestamp {
        run_id: f.non_empty("run_id")?,
        step: f.uint("step")?,
        index: f.uint("index")?,
    })
}

fn typed_delegation(obj: &Map<String, Value>) -> Decoded<Delegation> {
    let f = Fields::new(obj, "delegation");
    let delegation_id = f.non_empty("delegation_id")?;
    let root_signer_id = f.signer("root_signer_id")?;
    let delegate_signer_id = f.signer("delegate_signer_id")?;
    let epoch = f.uint("epoch")?;

    let items = f
        .value("scope_set")?
        .as_array()
        .ok_or_else(|| f.type_error("scope_set"))?;
    let mut scope_set = BTreeSet::new();
    for item in items {
        let scope = item
            .as_str()
            .and_then(|s| Scope::parse(s).ok())
            .ok_or_else(|| f.type_error("scope_set"))?;
        scope_set.insert(scope);
    }
    let signature = f.signature("signature")?;

    Ok(Delegation {
        delegation_id,
        root_signer_id,
        delegate_signer_id,
        epoch,
        scope_set,
        signature,
    })
}
