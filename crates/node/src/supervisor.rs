//! Task supervision for anytrust nodes
//!
//! Servers run as tracked tasks under one `CancellationToken`. A server that
//! fails outside of shutdown cancels the token, which stops its siblings and
//! lets `main` exit.
//!
//! ```ignore
//! let supervisor = NodeSupervisor::new();
//! supervisor.serve("member-http", listener, router);
//! supervisor.wait_for_signal().await;
//! supervisor.shutdown().await?;
//! ```

use axum::Router;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Default time allowed for in-flight requests to drain
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for supervised tasks
pub type SupervisedResult = Result<(), anyhow::Error>;

/// Tracks node tasks and coordinates their shutdown
#[derive(Clone)]
pub struct NodeSupervisor {
    tracker: TaskTracker,
    token: CancellationToken,
    shutting_down: Arc<AtomicBool>,
    shutdown_timeout: Duration,
}

impl Default for NodeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSupervisor {
    /// Create a new supervisor with default settings
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Create a new supervisor with custom shutdown timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            shutting_down: Arc::new(AtomicBool::new(false)),
            shutdown_timeout: timeout,
        }
    }

    /// Token cancelled when shutdown starts or a critical task fails
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Spawn a task that is handed the cancellation token and must return
    /// promptly once it fires. An error outside of shutdown cancels every
    /// other task.
    pub fn spawn_critical<F, Fut>(&self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = SupervisedResult> + Send + 'static,
    {
        let token = self.token.clone();
        let shutting_down = self.shutting_down.clone();

        self.tracker.spawn(async move {
            match f(token.clone()).await {
                Ok(()) => info!(task = name, "Task stopped"),
                Err(e) if shutting_down.load(Ordering::SeqCst) => {
                    info!(task = name, error = %e, "Task stopped during shutdown");
                }
                Err(e) => {
                    error!(task = name, error = ?e, "Critical task failed, shutting down");
                    token.cancel();
                }
            }
        });
    }

    /// Serve `router` on `listener` until the token is cancelled, then drain
    /// in-flight requests
    pub fn serve(&self, name: &'static str, listener: TcpListener, router: Router) {
        self.spawn_critical(name, move |token| async move {
            let addr = listener.local_addr()?;
            info!(task = name, %addr, "HTTP server listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await?;
            Ok(())
        });
    }

    /// Wait for Ctrl+C (or SIGTERM on unix), or for a critical task to fail
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            _ = shutdown_signal() => info!("Received shutdown signal"),
            _ = self.token.cancelled() => warn!("Node task failed"),
        }
    }

    /// Initiate graceful shutdown.
    ///
    /// Cancels the token, closes the tracker and waits for every task up to
    /// the shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already in progress");
            return Ok(());
        }

        info!("Initiating graceful shutdown...");
        self.tracker.close();
        self.token.cancel();

        match tokio::time::timeout(self.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("All tasks terminated gracefully");
                Ok(())
            }
            Err(_) => {
                error!(
                    timeout = ?self.shutdown_timeout,
                    "Shutdown timeout exceeded, some tasks may still be running"
                );
                Err(ShutdownError::Timeout(self.shutdown_timeout))
            }
        }
    }

    /// Number of running tasks
    pub fn task_count(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Errors that can occur during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShutdownError {
    /// Tasks were still running when the timeout elapsed
    #[error("shutdown timeout of {0:?} exceeded")]
    Timeout(Duration),
}
