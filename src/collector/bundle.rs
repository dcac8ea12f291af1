use crate::collector::{command_output, modified_date};
use crate::model::InventoryItem;
use crate::platform::{application_bundle_dirs, Platform};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Per-bundle timeout for reading `Info.plist`.
const PLIST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BundleSource;

#[async_trait]
impl super::Source for BundleSource {
    fn name(&self) -> &'static str {
        "Application Bundles"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::MacOS]
    }

    async fn collect(&self) -> Result<Vec<InventoryItem>> {
        let bundles: Vec<PathBuf> = application_bundle_dirs()
            .iter()
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .map(|e| e.into_path())
                    .filter(|p| p.extension().map(|e| e == "app").unwrap_or(false))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut items = Vec::with_capacity(bundles.len());

        for path in bundles {
            let name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            let version = bundle_version(&path).await;

            items.extend(InventoryItem::from_parts(
                name,
                version,
                Some(path.to_string_lossy().into_owned()),
                modified_date(&path),
            ));
        }

        Ok(items)
    }
}

async fn bundle_version(bundle: &Path) -> Option<String> {
    let plist = bundle.join("Contents").join("Info.plist");
    let plist = plist.to_str()?;

    for key in ["CFBundleShortVersionString", "CFBundleVersion"] {
        if let Ok(Some(version)) =
            command_output("plutil", &["-extract", key, "raw", "-o", "-", plist], PLIST_TIMEOUT).await
        {
            let version = version.trim();
            if !version.is_empty() {
                return Some(version.to_string());
            }
        }
    }

    None
}
