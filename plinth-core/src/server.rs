//! Transient loopback HTTP service.
//!
//! Bound to 127.0.0.1:0 so the OS picks an unused port; the orchestrator
//! starts it only once both stores have resolved, and the bound port is
//! published back through the `server-port` operation.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::context::AppContext;
use crate::rest;

pub struct HttpServer {
    port: u16,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HttpServer {
    /// Bind an ephemeral loopback port and serve the REST router until
    /// [`stop`](Self::stop).
    pub async fn start(ctx: Arc<AppContext>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let router = rest::create_router(ctx);

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            });
            if let Err(e) = serve.await {
                error!(error = %e, "HTTP server exited with error");
            }
        });
        info!(port, "HTTP API listening on 127.0.0.1");

        Ok(Self {
            port,
            shutdown,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Signal graceful shutdown and wait for in-flight requests to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
        info!(port = self.port, "HTTP API stopped");
    }
}
