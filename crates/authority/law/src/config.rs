//! Run configuration, read once and hashed at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use authority_canonical::{hash_canonical, Sha256Hash};
use authority_types::{Scope, SignerId, LAW_NAMESPACE};
use serde::{Deserialize, Serialize};

use crate::error::LawError;

pub const CONFIG_SCHEMA_VERSION: &str = "authority-kernel/1";

/// Frozen configuration of one kernel run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub run_id: String,

    /// Seed for the per-step batch order.
    #[serde(default)]
    pub seed: u64,

    /// Root signers. Trusted for every known scope.
    pub trusted_roots: BTreeSet<SignerId>,

    /// Directly registered actors and their scope grants (`ns/path` or `ns/*`).
    #[serde(default)]
    pub actors: BTreeMap<SignerId, BTreeSet<String>>,

    /// Namespaces a claim scope may use. `law` is always known.
    pub scope_namespaces: BTreeSet<String>,

    #[serde(default)]
    pub initial_epoch: u64,

    #[serde(default)]
    pub initial_revocations: Revocations,

    /// How many steps a claim's logical timestamp may lag the current cycle.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_steps: u64,

    /// Cycles after issuance during which a warrant may still execute.
    #[serde(default = "default_warrant_ttl")]
    pub warrant_ttl_steps: u64,

    /// Executions per cycle, keyed by scope namespace.
    #[serde(default)]
    pub rate_limits: BTreeMap<String, u32>,

    #[serde(default = "default_rate_limit")]
    pub default_rate_limit: u32,

    #[serde(default = "default_max_bundle_bytes")]
    pub max_bundle_bytes: u64,

    #[serde(default)]
    pub step_budget: StepBudget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Revocations {
    #[serde(default)]
    pub signers: BTreeSet<SignerId>,
    #[serde(default)]
    pub delegations: BTreeSet<String>,
}

/// Hard per-step limits. Exceeding either collapses the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepBudget {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_max_wall_clock_ms")]
    pub max_wall_clock_ms: u64,
}

impl Default for StepBudget {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_wall_clock_ms: default_max_wall_clock_ms(),
        }
    }
}

fn default_schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

fn default_freshness_window() -> u64 {
    4
}

fn default_warrant_ttl() -> u64 {
    2
}

fn default_rate_limit() -> u32 {
    64
}

fn default_max_bundle_bytes() -> u64 {
    64 * 1024
}

fn default_max_iterations() -> u64 {
    10_000
}

fn default_max_wall_clock_ms() -> u64 {
    5_000
}

impl KernelConfig {
    /// Minimal configuration: one run id, the given roots, the given namespaces.
    pub fn new(
        run_id: impl Into<String>,
        trusted_roots: impl IntoIterator<Item = SignerId>,
        scope_namespaces: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            run_id: run_id.into(),
            seed: 0,
            trusted_roots: trusted_roots.into_iter().collect(),
            actors: BTreeMap::new(),
            scope_namespaces: scope_namespaces.into_iter().map(Into::into).collect(),
            initial_epoch: 0,
            initial_revocations: Revocations::default(),
            freshness_window_steps: default_freshness_window(),
            warrant_ttl_steps: default_warrant_ttl(),
            rate_limits: BTreeMap::new(),
            default_rate_limit: default_rate_limit(),
            max_bundle_bytes: default_max_bundle_bytes(),
            step_budget: StepBudget::default(),
        }
    }

    /// Grant `actor` the given scope patterns.
    pub fn with_actor(
        mut self,
        actor: SignerId,
        grants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.actors
            .entry(actor)
            .or_default()
            .extend(grants.into_iter().map(Into::into));
        self
    }

    /// Load from a JSON or YAML file (by extension) and validate.
    pub fn load(path: &Path) -> Result<Self, LawError> {
        let text = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: Self = if is_yaml {
            serde_yaml::from_str(&text)?
        } else {
            serde_json::from_str(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LawError> {
        let invalid = |msg: String| Err(LawError::InvalidConfig(msg));

        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return invalid(format!("unsupported schema {}", self.schema_version));
        }
        if self.run_id.is_empty() {
            return invalid("run_id must not be empty".into());
        }
        if self.trusted_roots.is_empty() {
            return invalid("at least one trusted root is required".into());
        }
        for ns in &self.scope_namespaces {
            if Scope::parse(&format!("{ns}/x")).is_err() || ns.contains('/') {
                return invalid(format!("bad scope namespace {ns:?}"));
            }
        }
        for (actor, grants) in &self.actors {
            for grant in grants {
                let pattern_ok = match grant.strip_suffix("/*") {
                    Some(ns) => self.is_known_namespace(ns),
                    None => Scope::parse(grant)
                        .map(|s| self.is_known_namespace(s.namespace()))
                        .unwrap_or(false),
                };
                if !pattern_ok {
                    return invalid(format!("actor {actor} has bad grant {grant:?}"));
                }
            }
        }
        for ns in self.rate_limits.keys() {
            if !self.is_known_namespace(ns) {
                return invalid(format!("rate limit for unknown namespace {ns:?}"));
            }
        }
        if self.rate_limits.values().any(|&l| l == 0) || self.default_rate_limit == 0 {
            return invalid("rate limits must be positive".into());
        }
        if self.max_bundle_bytes == 0 {
            return invalid("max_bundle_bytes must be positive".into());
        }
        if self.step_budget.max_iterations == 0 || self.step_budget.max_wall_clock_ms == 0 {
            return invalid("step budgets must be positive".into());
        }
        Ok(())
    }

    /// `hash(canonical(config))`, recorded in the run header and manifest.
    pub fn config_hash(&self) -> Result<Sha256Hash, LawError> {
        Ok(hash_canonical(self)?)
    }

    /// `hash(canonical(sorted trusted roots))`; the state-hash chain's genesis.
    pub fn root_identity(&self) -> Result<Sha256Hash, LawError> {
        Ok(hash_canonical(&self.trusted_roots)?)
    }

    pub fn is_known_namespace(&self, ns: &str) -> bool {
        ns == LAW_NAMESPACE || self.scope_namespaces.contains(ns)
    }

    pub fn is_trusted_root(&self, signer: &SignerId) -> bool {
        self.trusted_roots.contains(signer)
    }

    pub fn is_registered_actor(&self, signer: &SignerId) -> bool {
        self.actors.contains_key(signer)
    }

    /// Whether `signer` may directly claim `scope`.
    ///
    /// Roots hold every scope; actors hold what their grants cover.
    pub fn grants_scope(&self, signer: &SignerId, scope: &Scope) -> bool {
        if self.is_trusted_root(signer) {
            return true;
        }
        self.actors.get(signer).is_some_and(|grants| {
            grants.iter().any(|grant| match grant.strip_suffix("/*") {
                Some(ns) => ns == scope.namespace(),
                None => grant == scope.as_str(),
            })
        })
    }

    pub fn rate_limit_for(&self, namespace: &str) -> u32 {
        self.rate_limits
            .get(namespace)
            .copied()
            .unwrap_or(self.default_rate_limit)
    }
}
