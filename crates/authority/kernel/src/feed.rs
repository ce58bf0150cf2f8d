//! Claim feeds: one JSON object per line, one line per step.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// `{"bundles": ["<raw bundle text>", ...]}`
///
/// Bundles travel as strings so malformed ones arrive byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedStep {
    pub bundles: Vec<String>,
}

impl FeedStep {
    pub fn raw(&self) -> Vec<Vec<u8>> {
        self.bundles.iter().map(|b| b.as_bytes().to_vec()).collect()
    }
}

/// Parse a feed. Blank lines are skipped.
pub fn parse_feed(text: &str) -> Result<Vec<FeedStep>, KernelError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| KernelError::Feed {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

pub fn read_feed(path: &Path) -> Result<Vec<FeedStep>, KernelError> {
    parse_feed(&std::fs::read_to_string(path)?)
}
