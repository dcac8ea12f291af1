//! Cross-platform path resolution.
//!
//! This module provides the current [`Platform`] and the locations
//! appcursor reads from or writes to.
//!
//! Lookup functions for optional locations return `Option<PathBuf>` -
//! returning `None` if the directory doesn't exist or can't be determined.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory name used under the platform data directory.
const DATA_DIR_NAME: &str = "AppCursor";

/// Directory name used under the platform config directory.
const CONFIG_DIR_NAME: &str = "appcursor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::Windows => "Windows",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Returns the directory holding the inventory database.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/AppCursor/`
/// - macOS: `~/Library/Application Support/AppCursor/`
/// - Windows: `%LOCALAPPDATA%\AppCursor\`
///
/// Falls back to the current directory when no data directory is known.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Returns the default inventory database path.
pub fn default_db_path() -> PathBuf {
    data_dir().join("storage.db")
}

/// Returns the path to the configuration file.
///
/// Platform-specific locations:
/// - Linux: `~/.config/appcursor/config.toml`
/// - macOS: `~/Library/Application Support/appcursor/config.toml`
/// - Windows: `%APPDATA%\appcursor\config.toml`
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join("config.toml")
}

/// Returns the macOS application bundle directories that exist.
///
/// Locations: `/Applications/` and `~/Applications/`.
pub fn application_bundle_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/Applications")];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join("Applications"));
    }
    dirs.into_iter().filter(|p| p.exists()).collect()
}

/// Returns the dpkg metadata directory if present.
///
/// Location: `/var/lib/dpkg/info/`
pub fn dpkg_info_dir() -> Option<PathBuf> {
    let path = PathBuf::from("/var/lib/dpkg/info");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}
