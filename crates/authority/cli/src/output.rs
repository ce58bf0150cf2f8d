//! Output formatting utilities

use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or as a JSON array.
pub fn print_rows<T: Serialize + Tabled>(rows: Vec<T>, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

/// Print one JSON document (both formats; tables add nothing here).
pub fn print_json<T: Serialize>(data: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn print_pass(message: &str) {
    println!("{} {}", "PASS".green().bold(), message);
}

pub fn print_fail(message: &str) {
    eprintln!("{} {}", "FAIL".red().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// First 12 hex digits, for tables.
pub fn short_hash(hex: &str) -> String {
    hex.chars().take(12).collect()
}
