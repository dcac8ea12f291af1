//! Installed application collectors.
//!
//! This module provides the [`Collector`] trait consumed by the scan
//! orchestrator and [`SystemCollector`], which gathers applications from
//! every [`Source`] supported on the current platform.
//!
//! # Available Sources
//!
//! | Source | Backing database | Platforms |
//! |--------|------------------|-----------|
//! | [`DpkgSource`] | `dpkg-query` | Linux |
//! | [`RpmSource`] | `rpm -qa` | Linux |
//! | [`HomebrewSource`] | `brew info --installed` | Linux, macOS |
//! | [`BundleSource`] | `/Applications` bundles | macOS |
//! | [`RegistrySource`] | Uninstall registry keys | Windows |
//!
//! # Example
//!
//! ```no_run
//! use appcursor::collector::{Collector, SystemCollector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let apps = SystemCollector::new().collect().await?;
//!     println!("Found {} applications", apps.len());
//!     Ok(())
//! }
//! ```

mod bundle;
mod dpkg;
mod homebrew;
mod registry;
mod rpm;

pub use bundle::BundleSource;
pub use dpkg::DpkgSource;
pub use homebrew::HomebrewSource;
pub use registry::RegistrySource;
pub use rpm::RpmSource;

use crate::model::InventoryItem;
use crate::platform::Platform;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound for a single package-database query.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collector failed: {0}")]
    Failed(String),

    #[error("every inventory source failed: {0}")]
    AllSourcesFailed(String),

    #[error("failed to persist inventory: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Produces the current inventory snapshot.
///
/// Implementations deduplicate by name, drop entries without a name and
/// fill missing fields with `"Unknown"` before returning.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> Result<Vec<InventoryItem>, CollectionError>;
}

/// A single package database or application directory.
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns the human-readable name of this source.
    fn name(&self) -> &'static str;

    /// Returns the platforms this source supports.
    fn supported_platforms(&self) -> &[Platform];

    /// Returns true if this source is supported on the current platform.
    fn is_supported(&self) -> bool {
        self.supported_platforms().contains(&Platform::current())
    }

    /// Lists installed applications.
    ///
    /// A missing tool (for example `rpm` on Debian) yields an empty list,
    /// not an error. Malformed individual entries are skipped.
    async fn collect(&self) -> anyhow::Result<Vec<InventoryItem>>;
}

/// Returns every known source, supported or not.
pub fn all_sources() -> Vec<Box<dyn Source>> {
    vec![
        Box::new(DpkgSource),
        Box::new(RpmSource),
        Box::new(HomebrewSource),
        Box::new(BundleSource),
        Box::new(RegistrySource),
    ]
}

/// Collects from every supported source and merges the results.
pub struct SystemCollector {
    sources: Vec<Box<dyn Source>>,
}

impl SystemCollector {
    pub fn new() -> Self {
        Self::with_sources(all_sources())
    }

    pub fn with_sources(sources: Vec<Box<dyn Source>>) -> Self {
        Self { sources }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for SystemCollector {
    async fn collect(&self) -> Result<Vec<InventoryItem>, CollectionError> {
        let mut batches = Vec::new();
        let mut failures = Vec::new();
        let mut attempted = 0usize;

        for source in self.sources.iter().filter(|s| s.is_supported()) {
            attempted += 1;
            match source.collect().await {
                Ok(items) => {
                    debug!(source = source.name(), count = items.len(), "source collected");
                    batches.push(items);
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "source failed");
                    failures.push(format!("{}: {:#}", source.name(), e));
                }
            }
        }

        if attempted > 0 && failures.len() == attempted {
            return Err(CollectionError::AllSourcesFailed(failures.join("; ")));
        }

        Ok(dedupe_by_name(batches.into_iter().flatten()))
    }
}

/// Keeps the first entry seen for each name.
pub fn dedupe_by_name(items: impl IntoIterator<Item = InventoryItem>) -> Vec<InventoryItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.name.is_empty() && seen.insert(item.name.clone()))
        .collect()
}

/// Runs `program` and returns its stdout.
///
/// Returns `Ok(None)` when the program is not installed or exits with a
/// non-zero status.
pub(crate) async fn command_output(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> anyhow::Result<Option<String>> {
    let child = Command::new(program).args(args).kill_on_drop(true).output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Ok(Err(e)) => return Err(anyhow::anyhow!("failed to execute {}: {}", program, e)),
        Err(_) => {
            return Err(anyhow::anyhow!(
                "{} did not finish within {}s",
                program,
                timeout.as_secs()
            ))
        }
    };

    if !output.status.success() {
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Formats a file's modification time as `YYYY-MM-DD`.
pub(crate) fn modified_date(path: &std::path::Path) -> Option<String> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let local: chrono::DateTime<chrono::Local> = modified.into();
    Some(local.format("%Y-%m-%d").to_string())
}

/// Formats a unix timestamp as `YYYY-MM-DD`.
pub(crate) fn epoch_date(secs: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}
