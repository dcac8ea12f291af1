//! Configuration file handling.
//!
//! This module provides loading and saving of appcursor configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/appcursor/config.toml`
//! - macOS: `~/Library/Application Support/appcursor/config.toml`
//! - Windows: `%APPDATA%\appcursor\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_port = 7869
//! db_path = "/home/me/.local/share/AppCursor/storage.db"
//! theme = "dark"
//! auto_start_api = true
//! remote_url = "https://inventory.example.com/ingest"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::platform;

/// Default port for the local HTTP API.
pub const DEFAULT_API_PORT: u16 = 7869;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// UI colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Windows98,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            "windows98" | "win98" => Ok(Theme::Windows98),
            _ => Err(format!(
                "Unknown theme: {}. Use 'dark', 'light', or 'windows98'",
                s
            )),
        }
    }
}

/// Application configuration.
///
/// This struct represents all configurable options for appcursor.
/// It can be loaded from a TOML file or created with default values.
/// Missing keys fall back to their defaults.
///
/// # Example
///
/// ```no_run
/// use appcursor::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("API port: {}", config.api_port);
/// println!("Database: {}", config.db_path.display());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the local HTTP API listens on.
    ///
    /// Default: 7869
    pub api_port: u16,

    /// Location of the inventory database.
    ///
    /// Default: `storage.db` in the platform data directory
    pub db_path: PathBuf,

    /// UI theme.
    ///
    /// Default: "dark"
    pub theme: Theme,

    /// Whether the HTTP API starts with the application.
    ///
    /// Default: true
    pub auto_start_api: bool,

    /// Endpoint that receives inventory uploads. Empty means not configured.
    pub remote_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            db_path: platform::default_db_path(),
            theme: Theme::default(),
            auto_start_api: true,
            remote_url: String::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Saves the configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        platform::config_file()
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn has_remote(&self) -> bool {
        !self.remote_url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api_port, 7869);
        assert_eq!(config.theme, Theme::Dark);
        assert!(config.auto_start_api);
        assert!(config.remote_url.is_empty());
        assert!(config.db_path.ends_with("storage.db"));
        assert!(!config.has_remote());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            api_port: 9000,
            db_path: dir.path().join("inv.db"),
            theme: Theme::Windows98,
            auto_start_api: false,
            remote_url: "https://example.com/ingest".to_string(),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_port = 8080\ntheme = \"light\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.theme, Theme::Light);
        assert!(config.auto_start_api);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_port = \"not a port\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("Win98".parse::<Theme>(), Ok(Theme::Windows98));
        assert!("solarized".parse::<Theme>().is_err());
    }
}
