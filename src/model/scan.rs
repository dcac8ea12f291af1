use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Outcome stored with each scan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Success => "success",
            ScanStatus::Failed => "failed",
        }
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ScanStatus::Success),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(format!("Invalid scan status: {}. Use 'success' or 'failed'", s)),
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted scan-result row.
///
/// `status` holds a [`ScanStatus`] string; the store only writes values
/// that parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub scan_type: String,
    pub scan_timestamp: String,
    pub status: String,
    pub details: String,
}

impl ScanRecord {
    pub fn is_success(&self) -> bool {
        self.status == ScanStatus::Success.as_str()
    }
}

/// Columns of the `scan_results` table that may be updated after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResultField {
    ScanType,
    ScanTimestamp,
    Status,
    Details,
}

impl ScanResultField {
    pub fn column(&self) -> &'static str {
        match self {
            ScanResultField::ScanType => "scan_type",
            ScanResultField::ScanTimestamp => "scan_timestamp",
            ScanResultField::Status => "status",
            ScanResultField::Details => "details",
        }
    }

    /// Checks that `value` may be stored in this column.
    ///
    /// `status` only accepts `success` or `failed`; the other columns are
    /// free-form.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        match self {
            ScanResultField::Status => value.parse::<ScanStatus>().map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl FromStr for ScanResultField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan_type" => Ok(ScanResultField::ScanType),
            "scan_timestamp" => Ok(ScanResultField::ScanTimestamp),
            "status" => Ok(ScanResultField::Status),
            "details" => Ok(ScanResultField::Details),
            _ => Err(format!(
                "Unknown scan result field: {}. Use 'scan_type', 'scan_timestamp', 'status', or 'details'",
                s
            )),
        }
    }
}
