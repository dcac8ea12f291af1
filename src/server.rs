//! Lifecycle of the background HTTP API server.
//!
//! [`ApiServer`] owns at most one running listener. `start` is a no-op
//! while a server is live, `stop` signals shutdown through a
//! [`CancellationToken`] and waits for the serve task to finish, and
//! `restart` is `stop` followed by `start`, so the old port is released
//! before the new one is bound.

use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Host the API binds to when none is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server task failed: {0}")]
    Join(String),
}

/// What [`ApiServer::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SocketAddr),
    AlreadyRunning(SocketAddr),
}

impl StartOutcome {
    pub fn addr(&self) -> SocketAddr {
        match self {
            StartOutcome::Started(addr) | StartOutcome::AlreadyRunning(addr) => *addr,
        }
    }
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct ApiServer {
    router: Router,
    running: Mutex<Option<RunningServer>>,
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addr = self
            .running
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.addr));
        f.debug_struct("ApiServer").field("addr", &addr).finish()
    }
}

impl ApiServer {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            running: Mutex::new(None),
        }
    }

    /// Binds `host:port` and serves on a background task.
    ///
    /// If a server is already live this does nothing and reports its
    /// address. Port `0` picks a free port.
    pub async fn start(&self, host: &str, port: u16) -> Result<StartOutcome, LifecycleError> {
        let mut running = self.running.lock().await;

        if let Some(server) = running.as_ref() {
            if server.is_live() {
                debug!(addr = %server.addr, "api server already running");
                return Ok(StartOutcome::AlreadyRunning(server.addr));
            }
        }

        // A previous task may have died on its own; reap it first.
        if let Some(dead) = running.take() {
            log_exit(dead.addr, dead.handle.await);
        }

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| LifecycleError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| LifecycleError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let router = self.router.clone();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(addr = %local_addr, "api server started");
        *running = Some(RunningServer {
            addr: local_addr,
            shutdown,
            handle,
        });

        Ok(StartOutcome::Started(local_addr))
    }

    /// Signals shutdown and waits for the server to stop accepting.
    ///
    /// Returns `false` if no server was running.
    pub async fn stop(&self) -> Result<bool, LifecycleError> {
        let Some(server) = self.running.lock().await.take() else {
            return Ok(false);
        };

        server.shutdown.cancel();
        let addr = server.addr;

        match server.handle.await {
            Ok(result) => {
                log_exit(addr, Ok(result));
                info!(addr = %addr, "api server stopped");
                Ok(true)
            }
            Err(e) => Err(LifecycleError::Join(e.to_string())),
        }
    }

    /// Stops any running server, then starts a new one on `host:port`.
    pub async fn restart(&self, host: &str, port: u16) -> Result<SocketAddr, LifecycleError> {
        self.stop().await?;
        Ok(self.start(host, port).await?.addr())
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .map(RunningServer::is_live)
            .unwrap_or(false)
    }

    /// Address of the live server, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .filter(|s| s.is_live())
            .map(|s| s.addr)
    }
}

fn log_exit(
    addr: SocketAddr,
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(addr = %addr, error = %e, "api server exited with error"),
        Err(e) => error!(addr = %addr, error = %e, "api server task aborted"),
    }
}
