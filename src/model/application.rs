use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::UNKNOWN;

/// An application as reported by a single collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub version: String,
    pub install_path: String,
    pub install_date: String,
}

impl InventoryItem {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        install_path: impl Into<String>,
        install_date: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            install_path: install_path.into(),
            install_date: install_date.into(),
        }
    }

    /// Builds an item from optional parts, filling gaps with `"Unknown"`.
    ///
    /// Returns `None` when the name is missing or blank; such entries are
    /// never handed to the store.
    pub fn from_parts(
        name: Option<String>,
        version: Option<String>,
        install_path: Option<String>,
        install_date: Option<String>,
    ) -> Option<Self> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;

        Some(Self {
            name,
            version: or_unknown(version),
            install_path: or_unknown(install_path),
            install_date: or_unknown(install_date),
        })
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// A persisted application row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub install_path: String,
    pub install_date: String,
}

/// Columns of the `applications` table that may be updated after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationField {
    Name,
    Version,
    InstallPath,
    InstallDate,
}

impl ApplicationField {
    pub fn column(&self) -> &'static str {
        match self {
            ApplicationField::Name => "name",
            ApplicationField::Version => "version",
            ApplicationField::InstallPath => "install_path",
            ApplicationField::InstallDate => "install_date",
        }
    }
}

impl FromStr for ApplicationField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ApplicationField::Name),
            "version" => Ok(ApplicationField::Version),
            "install_path" => Ok(ApplicationField::InstallPath),
            "install_date" => Ok(ApplicationField::InstallDate),
            _ => Err(format!(
                "Unknown application field: {}. Use 'name', 'version', 'install_path', or 'install_date'",
                s
            )),
        }
    }
}
