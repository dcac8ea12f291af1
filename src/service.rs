//! Service layer tying config, store, status, scans and the API server
//! together.
//!
//! [`AppContext`] is the shared state handed to HTTP handlers and
//! background tasks. [`AppService`] owns the context plus the
//! [`ApiServer`] and applies configuration changes, each through its own
//! typed setter so side effects (store reopen, server restart) stay
//! explicit.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::collector::{CollectionError, Collector, SystemCollector};
use crate::config::{Config, ConfigError, Theme};
use crate::export::ExportDocument;
use crate::model::Application;
use crate::orchestrator::{ScanError, ScanOrchestrator, ScanOutcome};
use crate::profile::{self, SystemProfile};
use crate::remote::{self, RemoteError, RemoteSender, SendOutcome};
use crate::server::{ApiServer, LifecycleError, StartOutcome, DEFAULT_HOST};
use crate::status::{Status, StatusTracker, StatusUpdate};
use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// State shared between the API server, background scans and callers.
pub struct AppContext {
    config: RwLock<Config>,
    config_path: PathBuf,
    store: Arc<InventoryStore>,
    status: Arc<StatusTracker>,
    orchestrator: Arc<ScanOrchestrator>,
    remote: RwLock<RemoteSender>,
}

impl AppContext {
    /// Returns a copy of the current configuration.
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
        &self.orchestrator
    }

    pub fn get_status(&self) -> Status {
        self.status.snapshot()
    }

    pub fn update_status(&self, update: StatusUpdate) -> Status {
        self.status.update(update)
    }

    pub async fn run_scan(&self) -> ScanOutcome {
        self.orchestrator.run_scan().await
    }

    /// Starts a background scan. Fails if one is already running.
    pub fn trigger_scan(&self) -> Result<JoinHandle<ScanOutcome>, ScanError> {
        self.orchestrator.trigger_scan()
    }

    pub async fn cache_app_inventory(&self) -> Result<usize, CollectionError> {
        self.orchestrator.cache_app_inventory().await
    }

    pub fn fetch_cached_inventory(&self) -> Result<Vec<Application>, StoreError> {
        self.orchestrator.fetch_cached_inventory()
    }

    pub async fn system_profile(&self) -> SystemProfile {
        profile::collect().await
    }

    /// Builds the export document from the stored inventory.
    pub async fn export_document(&self) -> Result<ExportDocument, StoreError> {
        let apps = self.fetch_cached_inventory()?;
        let profile = self.system_profile().await;
        Ok(ExportDocument::new(&profile, &apps))
    }

    /// Uploads the export document to the configured remote URL.
    pub async fn send_inventory(&self) -> Result<SendOutcome, StoreError> {
        let document = self.export_document().await?;
        let sender = self
            .remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(sender.send(&document).await)
    }

    /// Applies `f` to a copy of the config and saves it. The shared config
    /// only changes once the file has been written.
    fn with_config<T>(&self, f: impl FnOnce(&mut Config) -> T) -> Result<T, ConfigError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = config.clone();
        let value = f(&mut updated);
        updated.save_to(&self.config_path)?;
        *config = updated;
        Ok(value)
    }
}

pub struct AppService {
    ctx: Arc<AppContext>,
    server: ApiServer,
    api_host: Mutex<String>,
}

impl AppService {
    /// Loads the config file and opens the configured store with the
    /// system collector.
    pub fn open() -> Result<Self, ServiceError> {
        let config_path = Config::config_path();
        let config = Config::load_from(&config_path)?;
        Self::with_config(config, config_path, Arc::new(SystemCollector::new()))
    }

    /// Builds a service from an explicit config and collector.
    ///
    /// Config changes are persisted to `config_path`.
    pub fn with_config(
        config: Config,
        config_path: PathBuf,
        collector: Arc<dyn Collector>,
    ) -> Result<Self, ServiceError> {
        let store = Arc::new(InventoryStore::open(&config.db_path)?);
        let remote = RemoteSender::new(Some(config.remote_url.clone()))?;
        let status = Arc::new(StatusTracker::new());
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&status),
            collector,
        ));

        info!(db_path = %config.db_path.display(), "service initialised");

        let ctx = Arc::new(AppContext {
            config: RwLock::new(config),
            config_path,
            store,
            status,
            orchestrator,
            remote: RwLock::new(remote),
        });
        let server = ApiServer::new(api::router(Arc::clone(&ctx)));

        Ok(Self {
            ctx,
            server,
            api_host: Mutex::new(DEFAULT_HOST.to_string()),
        })
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn get_config(&self) -> Config {
        self.ctx.config()
    }

    pub fn get_status(&self) -> Status {
        self.ctx.get_status()
    }

    pub async fn run_scan(&self) -> ScanOutcome {
        self.ctx.run_scan().await
    }

    pub async fn cache_app_inventory(&self) -> Result<usize, CollectionError> {
        self.ctx.cache_app_inventory().await
    }

    pub fn fetch_cached_inventory(&self) -> Result<Vec<Application>, StoreError> {
        self.ctx.fetch_cached_inventory()
    }

    // --- API server control ---

    /// Starts the API server. Defaults to `127.0.0.1` and the configured port.
    pub async fn start_api(
        &self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<StartOutcome, LifecycleError> {
        let host = match host {
            Some(host) => {
                *self.api_host.lock().unwrap_or_else(PoisonError::into_inner) = host.to_string();
                host.to_string()
            }
            None => self.api_host(),
        };
        let port = port.unwrap_or_else(|| self.ctx.config().api_port);
        self.server.start(&host, port).await
    }

    /// Stops the running server and starts it again on the configured port.
    pub async fn restart_api(&self) -> Result<SocketAddr, LifecycleError> {
        let port = self.ctx.config().api_port;
        self.server.restart(&self.api_host(), port).await
    }

    /// Returns `false` if no server was running.
    pub async fn stop_api(&self) -> Result<bool, LifecycleError> {
        self.server.stop().await
    }

    pub async fn api_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr().await
    }

    fn api_host(&self) -> String {
        self.api_host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-applies `api_port` / `auto_start_api`: restarts the server when
    /// auto-start is on, stops it otherwise.
    async fn apply_api_settings(&self) -> Result<(), LifecycleError> {
        if self.ctx.config().auto_start_api {
            let addr = self.restart_api().await?;
            info!(addr = %addr, "api server restarted after config change");
        } else if self.stop_api().await? {
            info!("api server stopped after config change");
        }
        Ok(())
    }

    // --- Config setters ---

    /// Switches to a different database file.
    ///
    /// The store is reopened before the config is saved; if the new path
    /// cannot be opened, or the config cannot be saved, the old database is
    /// restored and the config is left unchanged.
    pub fn set_db_path(&self, path: PathBuf) -> Result<(), ServiceError> {
        let previous = self.ctx.store.path();

        if let Err(e) = self.ctx.store.reopen(&path) {
            warn!(path = %path.display(), error = %e, "could not open new database");
            self.ctx.store.reopen(&previous)?;
            return Err(e.into());
        }

        if let Err(e) = self.ctx.with_config(|c| c.db_path = path) {
            warn!(error = %e, "could not save config, keeping previous database");
            self.ctx.store.reopen(&previous)?;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn set_api_port(&self, port: u16) -> Result<(), ServiceError> {
        self.ctx.with_config(|c| c.api_port = port)?;
        self.apply_api_settings().await?;
        Ok(())
    }

    pub async fn set_auto_start_api(&self, enabled: bool) -> Result<(), ServiceError> {
        self.ctx.with_config(|c| c.auto_start_api = enabled)?;
        self.apply_api_settings().await?;
        Ok(())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), ServiceError> {
        self.ctx.with_config(|c| c.theme = theme)?;
        Ok(())
    }

    /// Sets the upload endpoint. Only `http://` and `https://` are accepted;
    /// an empty string clears it.
    pub fn set_remote_url(&self, url: &str) -> Result<(), ServiceError> {
        remote::validate_url(url)?;
        let url = url.trim().to_string();
        self.ctx.with_config(|c| c.remote_url = url.clone())?;
        self.ctx
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_url(&url)?;
        Ok(())
    }

    /// Stops the API server and closes the store.
    pub async fn close(&self) -> Result<(), ServiceError> {
        self.stop_api().await?;
        self.ctx.store.close()?;
        Ok(())
    }
}
