use crate::collector::{command_output, modified_date, COMMAND_TIMEOUT};
use crate::model::InventoryItem;
use crate::platform::{dpkg_info_dir, Platform};
use anyhow::Result;
use async_trait::async_trait;

pub struct DpkgSource;

#[async_trait]
impl super::Source for DpkgSource {
    fn name(&self) -> &'static str {
        "Debian Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Linux]
    }

    async fn collect(&self) -> Result<Vec<InventoryItem>> {
        let Some(stdout) = command_output(
            "dpkg-query",
            &["-W", "-f", "${Package}\t${Version}\t${Status}\n"],
            COMMAND_TIMEOUT,
        )
        .await?
        else {
            return Ok(Vec::new());
        };

        let info_dir = dpkg_info_dir();

        let items = parse_dpkg_output(&stdout)
            .into_iter()
            .filter_map(|(name, version)| {
                // The .list file is rewritten on install/upgrade.
                let install_date = info_dir.as_ref().and_then(|dir| {
                    modified_date(&dir.join(format!("{}.list", name)))
                        .or_else(|| modified_date(&dir.join(format!("{}:amd64.list", name))))
                });
                InventoryItem::from_parts(Some(name), Some(version), None, install_date)
            })
            .collect();

        Ok(items)
    }
}

/// Parses `dpkg-query` lines of `name\tversion\tstatus`, keeping only
/// packages that are fully installed.
fn parse_dpkg_output(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let name = parts.next()?.trim();
            let version = parts.next()?.trim();
            let status = parts.next().unwrap_or("install ok installed");

            if name.is_empty() || !status.ends_with("installed") || status.contains("not-installed") {
                return None;
            }
            Some((name.to_string(), version.to_string()))
        })
        .collect()
}
