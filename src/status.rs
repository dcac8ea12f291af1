//! In-memory scan status.
//!
//! [`Status`] is a plain value; every change goes through
//! [`Status::apply`] with a [`StatusEvent`], or through a
//! [`StatusUpdate`] that merges only the fields it carries.
//! [`StatusTracker`] owns the process-wide instance behind a lock and hands
//! out copies, so readers always see a complete snapshot.
//!
//! ```text
//! idle | error --ScanStarted--> scanning
//! scanning --ScanSucceeded--> idle   (progress = 100)
//! scanning --ScanFailed-----> error  (progress = 0)
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Value reported in [`Status::db_freshness`].
pub const DB_FRESHNESS: &str = "Up-to-date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Error,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: ScanState,
    pub last_scan: Option<String>,
    pub progress: u8,
    pub version: String,
    pub db_freshness: String,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            last_scan: None,
            progress: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
            db_freshness: DB_FRESHNESS.to_string(),
        }
    }
}

/// Something that happened to the scan pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A scan began at the given timestamp.
    ScanStarted { at: String },
    /// Intermediate progress, clamped to 100.
    Progress(u8),
    ScanSucceeded,
    ScanFailed,
}

impl Status {
    /// Returns the status after `event`.
    ///
    /// A scan may start from any state. Progress and completion events only
    /// take effect while scanning; outside a scan they leave the status as is.
    pub fn apply(mut self, event: StatusEvent) -> Status {
        match event {
            StatusEvent::ScanStarted { at } => {
                self.state = ScanState::Scanning;
                self.progress = 0;
                self.last_scan = Some(at);
            }
            StatusEvent::Progress(progress) if self.state == ScanState::Scanning => {
                self.progress = progress.min(100);
            }
            StatusEvent::ScanSucceeded if self.state == ScanState::Scanning => {
                self.state = ScanState::Idle;
                self.progress = 100;
            }
            StatusEvent::ScanFailed if self.state == ScanState::Scanning => {
                self.state = ScanState::Error;
                self.progress = 0;
            }
            _ => {}
        }
        self
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }
}

/// Partial status update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    pub state: Option<ScanState>,
    pub last_scan: Option<String>,
    pub progress: Option<u8>,
    pub version: Option<String>,
    pub db_freshness: Option<String>,
}

impl StatusUpdate {
    fn merge_into(self, status: &mut Status) {
        if let Some(state) = self.state {
            status.state = state;
        }
        if let Some(last_scan) = self.last_scan {
            status.last_scan = Some(last_scan);
        }
        if let Some(progress) = self.progress {
            status.progress = progress.min(100);
        }
        if let Some(version) = self.version {
            status.version = version;
        }
        if let Some(db_freshness) = self.db_freshness {
            status.db_freshness = db_freshness;
        }
    }
}

/// Lock-guarded owner of the process-wide [`Status`].
#[derive(Debug, Default)]
pub struct StatusTracker {
    inner: Mutex<Status>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> Status {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies a transition and returns the resulting status.
    pub fn apply(&self, event: StatusEvent) -> Status {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.clone().apply(event);
        guard.clone()
    }

    /// Merges the supplied fields and returns the resulting status.
    pub fn update(&self, update: StatusUpdate) -> Status {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        update.merge_into(&mut guard);
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> Status {
        Status::default().apply(StatusEvent::ScanStarted {
            at: "2024-05-01T12:00:00Z".to_string(),
        })
    }

    #[test]
    fn test_default_is_idle() {
        let status = Status::default();
        assert_eq!(status.state, ScanState::Idle);
        assert_eq!(status.progress, 0);
        assert!(status.last_scan.is_none());
        assert_eq!(status.db_freshness, DB_FRESHNESS);
    }

    #[test]
    fn test_scan_started_stamps_last_scan() {
        let status = started();
        assert_eq!(status.state, ScanState::Scanning);
        assert_eq!(status.progress, 0);
        assert_eq!(status.last_scan.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn test_success_and_failure_transitions() {
        let ok = started().apply(StatusEvent::Progress(50)).apply(StatusEvent::ScanSucceeded);
        assert_eq!(ok.state, ScanState::Idle);
        assert_eq!(ok.progress, 100);

        let failed = started().apply(StatusEvent::Progress(50)).apply(StatusEvent::ScanFailed);
        assert_eq!(failed.state, ScanState::Error);
        assert_eq!(failed.progress, 0);

        let restarted = failed.apply(StatusEvent::ScanStarted { at: "later".to_string() });
        assert_eq!(restarted.state, ScanState::Scanning);
        assert_eq!(restarted.last_scan.as_deref(), Some("later"));
    }

    #[test]
    fn test_completion_outside_scan_is_ignored() {
        let idle = Status::default();
        assert_eq!(idle.clone().apply(StatusEvent::ScanFailed), idle);
        assert_eq!(idle.clone().apply(StatusEvent::Progress(40)), idle);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(started().apply(StatusEvent::Progress(250)).progress, 100);

        let tracker = StatusTracker::new();
        let status = tracker.update(StatusUpdate {
            progress: Some(180),
            ..Default::default()
        });
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn test_update_merges_only_supplied_fields() {
        let tracker = StatusTracker::new();
        tracker.apply(StatusEvent::ScanStarted { at: "t0".to_string() });

        let status = tracker.update(StatusUpdate {
            db_freshness: Some("Stale".to_string()),
            ..Default::default()
        });

        assert_eq!(status.state, ScanState::Scanning);
        assert_eq!(status.last_scan.as_deref(), Some("t0"));
        assert_eq!(status.db_freshness, "Stale");
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let tracker = StatusTracker::new();
        let mut copy = tracker.snapshot();
        copy.state = ScanState::Error;
        copy.progress = 99;

        assert_eq!(tracker.snapshot(), Status::default());
    }
}
