mod cli;
mod json;

pub use cli::{print_history_table, print_inventory_table, print_profile_table, print_status};
pub use json::print_json;

use crate::model::{Application, ScanRecord};
use crate::profile::SystemProfile;
use anyhow::Result;

/// Output format for CLI listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_inventory(apps: &[Application], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_inventory_table(apps),
        OutputFormat::Json => print_json(apps),
    }
}

pub fn print_history(records: &[ScanRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_history_table(records),
        OutputFormat::Json => print_json(records),
    }
}

pub fn print_profile(profile: &SystemProfile, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_profile_table(profile),
        OutputFormat::Json => print_json(profile),
    }
}
