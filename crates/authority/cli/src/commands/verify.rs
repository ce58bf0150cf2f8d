//! `authority verify`

use std::path::Path;

use authority_audit::{verify_file, AuditError};
use serde::Serialize;

use crate::error::{CliError, CliResult};
use crate::output::{print_fail, print_json, print_pass, OutputFormat};

#[derive(Serialize)]
struct VerifyOutput {
    valid: bool,
    entries: Option<u64>,
    head: Option<String>,
    last_cycle: Option<u64>,
    error: Option<String>,
}

pub fn execute(log: &Path, format: OutputFormat) -> CliResult<()> {
    let result = verify_file(log);
    let out = match &result {
        Ok(summary) => VerifyOutput {
            valid: true,
            entries: Some(summary.entries),
            head: Some(summary.head.to_hex()),
            last_cycle: summary.last_cycle,
            error: None,
        },
        Err(e) => VerifyOutput {
            valid: false,
            entries: None,
            head: None,
            last_cycle: None,
            error: Some(e.to_string()),
        },
    };

    match format {
        OutputFormat::Json => print_json(&out)?,
        OutputFormat::Table => match &result {
            Ok(summary) => print_pass(&format!(
                "{} entries, head {}",
                summary.entries, summary.head
            )),
            Err(e) => print_fail(&e.to_string()),
        },
    }

    match result {
        Ok(_) => Ok(()),
        Err(e @ AuditError::ChainBroken { .. }) => Err(CliError::Failed(e.to_string())),
        Err(e) => Err(e.into()),
    }
}
