use crate::collector::{command_output, epoch_date, COMMAND_TIMEOUT};
use crate::model::InventoryItem;
use crate::platform::Platform;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub struct HomebrewSource;

#[derive(Deserialize)]
struct BrewFormula {
    name: String,
    versions: Option<BrewVersions>,
    #[serde(default)]
    installed: Vec<InstalledVersion>,
}

#[derive(Deserialize)]
struct BrewVersions {
    stable: Option<String>,
}

#[derive(Deserialize)]
struct InstalledVersion {
    version: String,
    time: Option<i64>,
}

#[derive(Deserialize)]
struct BrewCask {
    token: String,
    #[serde(default)]
    name: Vec<String>,
    installed: Option<String>,
    installed_time: Option<i64>,
}

#[derive(Deserialize)]
struct BrewInfo {
    #[serde(default)]
    formulae: Vec<BrewFormula>,
    #[serde(default)]
    casks: Vec<BrewCask>,
}

#[async_trait]
impl super::Source for HomebrewSource {
    fn name(&self) -> &'static str {
        "Homebrew Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Linux, Platform::MacOS]
    }

    async fn collect(&self) -> Result<Vec<InventoryItem>> {
        let Some(stdout) =
            command_output("brew", &["info", "--json=v2", "--installed"], COMMAND_TIMEOUT).await?
        else {
            return Ok(Vec::new());
        };

        let prefix = command_output("brew", &["--prefix"], COMMAND_TIMEOUT)
            .await
            .ok()
            .flatten()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        parse_brew_info(&stdout, prefix.as_deref())
    }
}

fn parse_brew_info(stdout: &str, prefix: Option<&str>) -> Result<Vec<InventoryItem>> {
    let info: BrewInfo =
        serde_json::from_str(stdout).context("Failed to parse brew info output")?;

    let mut items = Vec::new();

    for formula in info.formulae {
        let installed = formula.installed.first();
        let version = installed
            .map(|v| v.version.clone())
            .or_else(|| formula.versions.and_then(|v| v.stable));
        let install_date = installed.and_then(|v| v.time).and_then(epoch_date);
        let install_path = prefix.map(|p| format!("{}/Cellar/{}", p, formula.name));

        items.extend(InventoryItem::from_parts(
            Some(formula.name),
            version,
            install_path,
            install_date,
        ));
    }

    for cask in info.casks {
        let name = cask.name.first().cloned().unwrap_or_else(|| cask.token.clone());
        let install_path = prefix.map(|p| format!("{}/Caskroom/{}", p, cask.token));
        let install_date = cask.installed_time.and_then(epoch_date);

        items.extend(InventoryItem::from_parts(
            Some(name),
            cask.installed,
            install_path,
            install_date,
        ));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN;

    #[test]
    fn test_parse_brew_info() {
        let stdout = r#"{
            "formulae": [
                {"name": "wget", "versions": {"stable": "1.24.5"},
                 "installed": [{"version": "1.24.5_1", "time": 1704067200}]},
                {"name": "jq", "versions": {"stable": "1.7.1"}, "installed": []}
            ],
            "casks": [
                {"token": "firefox", "name": ["Mozilla Firefox"], "installed": "128.0",
                 "installed_time": 1704067200}
            ]
        }"#;

        let items = parse_brew_info(stdout, Some("/opt/homebrew")).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].name, "wget");
        assert_eq!(items[0].version, "1.24.5_1");
        assert_eq!(items[0].install_path, "/opt/homebrew/Cellar/wget");
        assert_eq!(items[0].install_date, "2024-01-01");

        assert_eq!(items[1].version, "1.7.1");
        assert_eq!(items[1].install_date, UNKNOWN);

        assert_eq!(items[2].name, "Mozilla Firefox");
        assert_eq!(items[2].install_path, "/opt/homebrew/Caskroom/firefox");
    }

    #[test]
    fn test_parse_brew_info_rejects_garbage() {
        assert!(parse_brew_info("not json", None).is_err());
    }
}
