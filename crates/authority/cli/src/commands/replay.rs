//! `authority replay`

use std::path::Path;
use std::sync::Arc;

use authority_audit::RunManifest;
use authority_canonical::Sha256Hash;
use authority_replay::{replay_file, DivergenceSummary, ReplayError, ReplayReport};
use serde::Serialize;

use crate::error::{CliError, CliResult};
use crate::output::{print_fail, print_info, print_json, print_pass, OutputFormat};

#[derive(Serialize)]
struct ReplayOutput<'a> {
    valid: bool,
    report: Option<&'a ReplayReport>,
    divergence: Option<DivergenceSummary>,
}

/// Replay `log` under its frozen configuration; optionally compare the
/// state-hash sequence with `expected`.
pub fn replay(log: &Path, expected: Option<&Path>) -> CliResult<Result<ReplayReport, ReplayError>> {
    let manifest = RunManifest::read(log)?;
    let expected: Option<Vec<Sha256Hash>> = match expected {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => None,
    };
    let result = replay_file(log, Arc::new(manifest.config)).and_then(|report| {
        if let Some(expected) = &expected {
            report.compare(expected)?;
        }
        Ok(report)
    });
    Ok(result)
}

pub fn execute(log: &Path, expected: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let result = replay(log, expected)?;
    let divergence = match &result {
        Err(ReplayError::Divergence(d)) => Some(DivergenceSummary::from(d)),
        _ => None,
    };

    match format {
        OutputFormat::Json => print_json(&ReplayOutput {
            valid: result.is_ok(),
            report: result.as_ref().ok(),
            divergence,
        })?,
        OutputFormat::Table => match &result {
            Ok(report) => {
                for (cycle, hash) in report.state_hashes.iter().enumerate() {
                    println!("{cycle:>6}  {hash}");
                }
                if let Some(cycle) = report.open_cycle {
                    print_info(&format!("cycle {cycle} was opened but never committed"));
                }
                if let Some(reason) = &report.collapsed {
                    print_info(&format!("run collapsed: {reason}"));
                }
                print_pass(&format!(
                    "{} cycles replayed from {} entries",
                    report.cycles(),
                    report.entries
                ));
            }
            Err(e) => print_fail(&e.to_string()),
        },
    }

    match result {
        Ok(_) => Ok(()),
        Err(e @ ReplayError::Divergence(_)) => Err(CliError::Failed(e.to_string())),
        Err(e) => Err(e.into()),
    }
}
