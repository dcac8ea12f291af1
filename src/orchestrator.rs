//! Scan orchestration.
//!
//! A scan collects the current inventory, appends it to the store, records
//! one scan-result row and moves the shared [`StatusTracker`] through
//! `scanning` to `idle` or `error`. At most one scan runs at a time; a
//! second trigger while one is in flight is rejected.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use appcursor::{InventoryStore, ScanOrchestrator, StatusTracker};
//! use appcursor::collector::SystemCollector;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = ScanOrchestrator::new(
//!         Arc::new(InventoryStore::open_in_memory()?),
//!         Arc::new(StatusTracker::new()),
//!         Arc::new(SystemCollector::new()),
//!     );
//!
//!     let outcome = orchestrator.run_scan().await;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collector::{CollectionError, Collector};
use crate::model::{Application, InventoryItem, ScanStatus};
use crate::status::{Status, StatusEvent, StatusTracker};
use crate::store::{InventoryStore, StoreError};

/// `scan_type` written for every orchestrated scan.
pub const SCAN_TYPE: &str = "system";

/// Progress reported once collection has finished and persistence begins.
const COLLECTED_PROGRESS: u8 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("a scan is already in progress")]
    AlreadyRunning,
}

/// How a call to [`ScanOrchestrator::run_scan`] ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Inventory persisted; `count` applications were appended.
    Completed { count: usize },
    /// The pipeline failed; a failed scan result was recorded.
    Failed { message: String },
    /// Another scan was already running; nothing was touched.
    Skipped,
}

/// Clears the in-progress flag when dropped.
struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl ScanGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ScanOrchestrator {
    store: Arc<InventoryStore>,
    status: Arc<StatusTracker>,
    collector: Arc<dyn Collector>,
    in_progress: Arc<AtomicBool>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<InventoryStore>,
        status: Arc<StatusTracker>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        Self {
            store,
            status,
            collector,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    /// Returns a copy of the current scan status.
    pub fn status(&self) -> Status {
        self.status.snapshot()
    }

    pub fn is_scanning(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs one scan to completion.
    ///
    /// Never fails: collection and persistence errors are recorded as a
    /// failed scan result and an `error` status. Returns
    /// [`ScanOutcome::Skipped`] if another scan holds the slot.
    pub async fn run_scan(&self) -> ScanOutcome {
        let Some(_guard) = ScanGuard::acquire(&self.in_progress) else {
            warn!("scan requested while another scan is running");
            return ScanOutcome::Skipped;
        };
        self.execute().await
    }

    /// Starts a scan on a background task and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger_scan(self: &Arc<Self>) -> Result<JoinHandle<ScanOutcome>, ScanError> {
        let guard = ScanGuard::acquire(&self.in_progress).ok_or(ScanError::AlreadyRunning)?;
        let this = Arc::clone(self);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.execute().await
        }))
    }

    /// Collects the inventory and appends it to the store.
    ///
    /// Returns the number of applications persisted. The whole batch is
    /// written in one transaction.
    pub async fn cache_app_inventory(&self) -> Result<usize, CollectionError> {
        let items = self.collect_items().await?;
        self.persist(&items)
    }

    /// Reads the stored inventory. Every call goes to the store.
    pub fn fetch_cached_inventory(&self) -> Result<Vec<Application>, StoreError> {
        self.store.fetch_applications()
    }

    async fn execute(&self) -> ScanOutcome {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.status.apply(StatusEvent::ScanStarted {
            at: timestamp.clone(),
        });
        info!(scan_timestamp = %timestamp, "scan started");

        let persisted = self.collect_items().await.and_then(|items| {
            self.status.apply(StatusEvent::Progress(COLLECTED_PROGRESS));
            self.persist(&items)
        });
        let count = match persisted {
            Ok(count) => count,
            Err(e) => return self.record_failure(&timestamp, e.to_string()),
        };

        let details = serde_json::json!({ "apps": count }).to_string();
        if let Err(e) = self.store.insert_scan_result(
            SCAN_TYPE,
            &timestamp,
            ScanStatus::Success,
            &details,
        ) {
            return self.record_failure(&timestamp, e.to_string());
        }

        self.status.apply(StatusEvent::ScanSucceeded);
        info!(count, "scan completed");
        ScanOutcome::Completed { count }
    }

    /// Runs the collector, turning a panic into [`CollectionError::Failed`].
    async fn collect_items(&self) -> Result<Vec<InventoryItem>, CollectionError> {
        AssertUnwindSafe(self.collector.collect())
            .catch_unwind()
            .await
            .map_err(|panic| CollectionError::Failed(panic_message(panic)))?
    }

    fn persist(&self, items: &[InventoryItem]) -> Result<usize, CollectionError> {
        let ids = self.store.insert_applications(items)?;
        Ok(ids.len())
    }

    fn record_failure(&self, timestamp: &str, message: String) -> ScanOutcome {
        error!(error = %message, "scan failed");

        let details = serde_json::json!({ "error": message }).to_string();
        if let Err(e) = self.store.insert_scan_result(
            SCAN_TYPE,
            timestamp,
            ScanStatus::Failed,
            &details,
        ) {
            error!(error = %e, "could not record failed scan");
        }

        self.status.apply(StatusEvent::ScanFailed);
        ScanOutcome::Failed { message }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("collector panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("collector panicked: {}", s)
    } else {
        "collector panicked".to_string()
    }
}
