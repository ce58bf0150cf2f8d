//! Where executed effects land.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use authority_types::Effect;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::GateError;

/// An effect destination.
///
/// Effects carry their warrant id, so restart reconciliation can compare the
/// destination against the execution log.
pub trait EffectSink: Send + Sync {
    /// Apply one effect durably.
    fn apply(&self, effect: &Effect) -> Result<(), GateError>;

    /// Every effect applied so far, in application order.
    fn effects(&self) -> Result<Vec<Effect>, GateError>;
}

/// In-memory destination. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryDestination {
    effects: Arc<RwLock<Vec<Effect>>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Effect> {
        self.effects.read().clone()
    }
}

impl EffectSink for MemoryDestination {
    fn apply(&self, effect: &Effect) -> Result<(), GateError> {
        self.effects.write().push(effect.clone());
        Ok(())
    }

    fn effects(&self) -> Result<Vec<Effect>, GateError> {
        Ok(self.snapshot())
    }
}

/// JSON-lines destination: one applied effect per line, synced on write.
pub struct FileDestination {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileDestination {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, GateError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EffectSink for FileDestination {
    fn apply(&self, effect: &Effect) -> Result<(), GateError> {
        let _guard = self.lock.write();
        let mut line = serde_json::to_vec(effect)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    fn effects(&self) -> Result<Vec<Effect>, GateError> {
        let _guard = self.lock.read();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut effects = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Effect>(&line) {
                Ok(effect) => effects.push(effect),
                // A torn final write never completed, so it was never applied.
                Err(e) if !line.ends_with('\n') => {
                    warn!(path = %self.path.display(), error = %e, "ignoring torn trailing effect");
                }
                Err(e) => return Err(GateError::Destination(format!("corrupt effect line: {e}"))),
            }
        }
        Ok(effects)
    }
}
