//! `authority run`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use authority_audit::{manifest_path, FileAuditLog, RunManifest};
use authority_gate::FileDestination;
use authority_kernel::{read_feed, Kernel, KernelError, StepReport};
use authority_law::KernelConfig;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::output::{print_fail, print_info, print_rows, short_hash, OutputFormat};

#[derive(Tabled, Serialize)]
struct StepRow {
    #[tabled(rename = "Cycle")]
    cycle: u64,
    #[tabled(rename = "Received")]
    received: usize,
    #[tabled(rename = "Admitted")]
    admitted: usize,
    #[tabled(rename = "Refused")]
    refused: usize,
    #[tabled(rename = "Executed")]
    executed: usize,
    #[tabled(rename = "Denied")]
    denied: usize,
    #[tabled(rename = "State Hash")]
    #[serde(skip)]
    short: String,
    #[tabled(skip)]
    state_hash: String,
}

impl From<&StepReport> for StepRow {
    fn from(r: &StepReport) -> Self {
        let state_hash = r.state_hash.to_hex();
        Self {
            cycle: r.cycle,
            received: r.received,
            admitted: r.admitted,
            refused: r.refused,
            executed: r.executed,
            denied: r.denied,
            short: short_hash(&state_hash),
            state_hash,
        }
    }
}

/// `<log>.effects.jsonl`
fn default_destination(log: &Path) -> PathBuf {
    let mut name = log.as_os_str().to_os_string();
    name.push(".effects.jsonl");
    PathBuf::from(name)
}

/// Freeze the configuration next to a new log, or check it against the one
/// an existing log was started under.
fn freeze(config: &KernelConfig, log: &Path) -> CliResult<()> {
    let fresh = RunManifest::for_config(config)?;
    if manifest_path(log).exists() {
        let frozen = RunManifest::read(log)?;
        if frozen.config_hash != fresh.config_hash {
            return Err(CliError::ManifestMismatch(format!(
                "log was started under {}, given {}",
                frozen.config_hash, fresh.config_hash
            )));
        }
    } else {
        let path = fresh.write(log)?;
        info!(path = %path.display(), "wrote run manifest");
    }
    Ok(())
}

pub fn run(
    config: &Path,
    feed: &Path,
    log: &Path,
    destination: Option<&Path>,
) -> CliResult<Vec<StepReport>> {
    let config = KernelConfig::load(config)?;
    let steps = read_feed(feed)?;
    freeze(&config, log)?;

    let destination = destination.map_or_else(|| default_destination(log), Path::to_path_buf);
    let audit = Arc::new(FileAuditLog::open(log)?);
    let sink = Arc::new(FileDestination::new(destination)?);
    let mut kernel = Kernel::open(config, audit, sink)?;

    let mut reports = Vec::with_capacity(steps.len());
    for step in &steps {
        match kernel.step(&step.raw()) {
            Ok(report) => reports.push(report),
            Err(KernelError::Collapse(reason)) => {
                print_fail(&format!("run collapsed at cycle {}: {reason}", kernel.cycle()));
                return Err(KernelError::Collapse(reason).into());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(reports)
}

pub fn execute(
    config: &Path,
    feed: &Path,
    log: &Path,
    destination: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let reports = run(config, feed, log, destination)?;
    if format == OutputFormat::Table {
        print_info(&format!("{} step(s) committed to {}", reports.len(), log.display()));
    }
    print_rows(reports.iter().map(StepRow::from).collect(), format)?;
    Ok(())
}
