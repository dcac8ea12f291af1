//! Core data types for inventory and scan history.
//!
//! This module contains the record types persisted by the store and
//! returned to callers:
//!
//! - [`InventoryItem`] - One application as reported by a collector
//! - [`Application`] - A persisted application row
//! - [`ScanRecord`] - A persisted scan outcome row
//! - [`ScanStatus`] - Outcome of a scan (`success` / `failed`)
//!
//! # Example
//!
//! ```
//! use appcursor::InventoryItem;
//!
//! let item = InventoryItem::new("Firefox", "128.0", "/usr/lib/firefox", "2024-07-09");
//! assert_eq!(item.name, "Firefox");
//! ```

mod application;
mod scan;

pub use application::*;
pub use scan::*;

/// Placeholder written for fields a collector could not determine.
pub const UNKNOWN: &str = "Unknown";
