pub mod api;
pub mod collector;
pub mod config;
pub mod export;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod platform;
pub mod profile;
pub mod remote;
pub mod server;
pub mod service;
pub mod status;
pub mod store;

pub use config::{Config, Theme};
pub use model::{Application, InventoryItem, ScanRecord, ScanStatus};
pub use orchestrator::{ScanError, ScanOrchestrator, ScanOutcome};
pub use platform::Platform;
pub use server::{ApiServer, StartOutcome};
pub use service::{AppContext, AppService, ServiceError};
pub use status::{ScanState, Status, StatusTracker};
pub use store::{InventoryStore, StoreError};
