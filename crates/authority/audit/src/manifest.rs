use std::path::{Path, PathBuf};

use authority_canonical::Sha256Hash;
use authority_law::KernelConfig;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Sidecar written next to the log: the frozen configuration and the hashes
/// the `RunStarted` entry commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    pub run_id: String,
    pub schema_version: String,
    pub config_hash: Sha256Hash,
    pub root_identity: Sha256Hash,
    pub config: KernelConfig,
}

/// `<log>.manifest.json`
pub fn manifest_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(".manifest.json");
    PathBuf::from(name)
}

impl RunManifest {
    pub fn for_config(config: &KernelConfig) -> Result<Self, AuditError> {
        Ok(Self {
            run_id: config.run_id.clone(),
            schema_version: config.schema_version.clone(),
            config_hash: config
                .config_hash()
                .map_err(|e| AuditError::Manifest(e.to_string()))?,
            root_identity: config
                .root_identity()
                .map_err(|e| AuditError::Manifest(e.to_string()))?,
            config: config.clone(),
        })
    }

    pub fn write(&self, log_path: &Path) -> Result<PathBuf, AuditError> {
        let path = manifest_path(log_path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn read(log_path: &Path) -> Result<Self, AuditError> {
        let path = manifest_path(log_path);
        let text = std::fs::read_to_string(&path)?;
        let manifest: Self = serde_json::from_str(&text)?;
        manifest.check()?;
        Ok(manifest)
    }

    /// The recorded hashes still describe the recorded configuration.
    pub fn check(&self) -> Result<(), AuditError> {
        let fresh = Self::for_config(&self.config)?;
        if fresh.config_hash != self.config_hash {
            return Err(AuditError::Manifest("config hash does not match config".into()));
        }
        if fresh.root_identity != self.root_identity {
            return Err(AuditError::Manifest("root identity does not match config".into()));
        }
        Ok(())
    }
}
