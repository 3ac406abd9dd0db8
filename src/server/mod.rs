//! Development HTTP server.
//!
//! Serves the output directory with live reload. The server owns its own tokio
//! runtime so the rest of the crate (scheduler, watcher) stays synchronous;
//! the only link between the two sides is the [`LiveReload`] sender.

pub mod livereload;

pub use livereload::{LiveReload, ReloadEvent};

use crate::config::ServerConfig;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start server runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Routes for serving `root` with the live-reload endpoints.
pub fn router(config: &ServerConfig, root: &Path, reload: LiveReload) -> Router {
    let mut app = Router::new()
        .route(livereload::EVENTS_PATH, get(livereload::events))
        .route(livereload::CLIENT_PATH, get(livereload::client_script))
        .with_state(reload)
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true));

    if config.live_reload {
        app = app.layer(middleware::from_fn(livereload::inject_client));
    }
    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// A running dev server. Stops on [`DevServer::shutdown`] or drop.
pub struct DevServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    runtime: Option<Runtime>,
}

impl DevServer {
    /// Bind `server.host:server.port` and start serving `root` in the background.
    pub fn start(config: &ServerConfig, root: &Path, reload: LiveReload) -> Result<Self, ServerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sitepipe-server")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        let bind = format!("{}:{}", config.host, config.port);
        let bind_error = |source| ServerError::Bind { addr: bind.clone(), source };
        let listener = runtime.block_on(TcpListener::bind(&bind)).map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;

        let app = router(config, root, reload);
        let (tx, rx) = oneshot::channel::<()>();
        runtime.spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "dev server stopped");
            }
        });

        tracing::info!(%addr, root = %root.display(), "dev server listening");
        Ok(Self { addr, shutdown: Some(tx), runtime: Some(runtime) })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        // Open SSE streams never finish on their own
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(1));
            tracing::debug!(addr = %self.addr, "dev server shut down");
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DevServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevServer").field("addr", &self.addr).finish()
    }
}
