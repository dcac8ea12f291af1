//! JSON export document: system profile plus application inventory.
//!
//! The same shapes are served by the HTTP API and uploaded by the remote
//! sender, so they use camelCase field names.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

use crate::model::Application;
use crate::profile::SystemProfile;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentView {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemProfileView {
    pub os_name: String,
    pub os_version: String,
    pub architecture: String,
    pub kernel_version: String,
    pub hostname: String,
    pub last_boot: Option<String>,
    pub system_components: Vec<ComponentView>,
}

impl From<&SystemProfile> for SystemProfileView {
    fn from(profile: &SystemProfile) -> Self {
        Self {
            os_name: profile.os_name.clone(),
            os_version: profile.os_version.clone(),
            architecture: profile.architecture.clone(),
            kernel_version: profile.kernel_version.clone(),
            hostname: profile.hostname.clone(),
            last_boot: None,
            system_components: profile
                .components
                .iter()
                .map(|(name, version)| ComponentView {
                    name: name.clone(),
                    version: version.clone(),
                    kind: "service".to_string(),
                    description: format!("{} version info", name),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    /// Display id, `app-001` for the first listed application.
    pub id: String,
    /// Row id in the store, usable with the delete/update endpoints.
    pub store_id: i64,
    pub name: String,
    pub version: String,
    pub install_path: String,
    pub install_date: String,
    pub publisher: Option<String>,
    pub size: Option<u64>,
    pub last_modified: Option<String>,
    pub vulnerability_count: u32,
    pub update_available: bool,
    pub update_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryView {
    pub total_applications: usize,
    pub last_scanned: String,
    pub applications: Vec<ApplicationView>,
}

impl InventoryView {
    pub fn new(apps: &[Application]) -> Self {
        let applications: Vec<ApplicationView> = apps
            .iter()
            .enumerate()
            .map(|(idx, app)| ApplicationView {
                id: format!("app-{:03}", idx + 1),
                store_id: app.id,
                name: app.name.clone(),
                version: app.version.clone(),
                install_path: app.install_path.clone(),
                install_date: app.install_date.clone(),
                publisher: None,
                size: None,
                last_modified: None,
                vulnerability_count: 0,
                update_available: false,
                update_version: None,
            })
            .collect();

        Self {
            total_applications: applications.len(),
            last_scanned: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            applications,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub system_profile: SystemProfileView,
    pub application_inventory: InventoryView,
}

/// Top-level export envelope: `{"status": "success", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub status: &'static str,
    pub data: ExportData,
}

impl ExportDocument {
    pub fn new(profile: &SystemProfile, apps: &[Application]) -> Self {
        Self {
            status: "success",
            data: ExportData {
                system_profile: SystemProfileView::from(profile),
                application_inventory: InventoryView::new(apps),
            },
        }
    }

    /// Writes the document as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
