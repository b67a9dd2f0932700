//! Serving the app bundle, or attaching to an origin that already does.
//!
//! The historical workflow was "start any static server on :8080, then run
//! the scripts". The built-in mode folds that step into the harness; the
//! external mode keeps the old workflow working.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

/// How the harness reaches the app under test.
#[derive(Debug, Clone)]
pub enum ServerMode {
    /// Serve `app_dir` ourselves on `port` (0 or None = OS-assigned).
    Builtin {
        app_dir: PathBuf,
        port: Option<u16>,
    },
    /// Attach to an app already served elsewhere.
    External { origin: String },
}

/// A running (or attached) app server.
#[derive(Debug)]
pub struct AppServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AppServer {
    pub async fn start(mode: &ServerMode, startup_timeout: Duration) -> HarnessResult<Self> {
        match mode {
            ServerMode::Builtin { app_dir, port } => Self::serve(app_dir, *port).await,
            ServerMode::External { origin } => Self::attach(origin, startup_timeout).await,
        }
    }

    /// Bind a local static server for the app bundle, with a `/health`
    /// route for probes.
    pub async fn serve(app_dir: &Path, port: Option<u16>) -> HarnessResult<Self> {
        if !app_dir.is_dir() {
            return Err(HarnessError::ServerStartup(format!(
                "app bundle directory not found: {}",
                app_dir.display()
            )));
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(0)));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| HarnessError::ServerStartup(format!("bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| HarnessError::ServerStartup(e.to_string()))?;

        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .fallback_service(ServeDir::new(app_dir.to_path_buf()))
            .layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!("app server error: {e}");
            }
        });

        let base_url = format!("http://127.0.0.1:{}", local_addr.port());
        info!(%base_url, dir = %app_dir.display(), "serving app bundle");

        Ok(Self {
            base_url,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Poll an external origin until it answers, then hand back a handle
    /// that owns no process.
    pub async fn attach(origin: &str, startup_timeout: Duration) -> HarnessResult<Self> {
        let origin = origin.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0usize;

        while start.elapsed() < startup_timeout {
            attempts += 1;
            match client.get(&origin).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    info!(%origin, "attached to running app server");
                    return Ok(Self {
                        base_url: origin,
                        shutdown: None,
                        task: None,
                    });
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), "origin probe returned an error status");
                }
                Err(e) if e.is_connect() => {
                    if attempts == 1 {
                        info!(%origin, "waiting for app server...");
                    }
                }
                Err(e) => warn!("origin probe failed: {e}"),
            }
            sleep(Duration::from_millis(200)).await;
        }

        Err(HarnessError::OriginUnreachable { origin, attempts })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serve_rejects_missing_bundle_dir() {
        let err = AppServer::serve(Path::new("/nonexistent/app/dist"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ServerStartup(_)));
    }

    #[tokio::test]
    async fn attach_times_out_on_dead_origin() {
        // Reserved port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = AppServer::attach(
            &format!("http://127.0.0.1:{port}"),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::OriginUnreachable { .. }));
    }
}
