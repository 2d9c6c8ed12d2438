//! Startup orchestration.
//!
//! Wires gate, context, dispatcher and bridge; launches both store
//! initializers in parallel; waits for both to resolve (all-of, success or
//! not); and only then brings up the transient HTTP service. The bridge is
//! live from the first moment - early requests park in the gate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bridge;
use crate::context::AppContext;
use crate::dispatch::Dispatcher;
use crate::document::DocStore;
use crate::ready::{ReadinessState, ReadyGate, ReadySignal, StoreKind};
use crate::relational::SqlStore;
use crate::server::HttpServer;

pub struct HostOptions {
    pub data_dir: PathBuf,
    /// Capacity of the boundary-channel queue.
    pub queue_capacity: usize,
    /// Skip the HTTP service (stores and bridge only).
    pub serve_http: bool,
}

impl HostOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            queue_capacity: 64,
            serve_http: true,
        }
    }
}

/// A running core process: both stores, the dispatch loop, and (once the
/// stores are up) the HTTP service.
pub struct Host {
    pub client: plinth_ipc::BridgeClient,
    ctx: Arc<AppContext>,
    dispatch_loop: JoinHandle<()>,
}

impl Host {
    /// Boot the core. Returns once both initializers have resolved and,
    /// when both stores came up, the HTTP service is listening. Store
    /// failures do not abort the boot: the host stays alive and dependent
    /// operations fail through the gate.
    pub async fn start(options: HostOptions) -> Result<Host> {
        let mut gate = ReadyGate::new();
        let sql_signal = gate.register(StoreKind::Relational);
        let doc_signal = gate.register(StoreKind::Document);
        let ctx = AppContext::new(gate);

        let (client, server) = plinth_ipc::channel(options.queue_capacity);
        let dispatch_loop = bridge::serve(server, Dispatcher::new(ctx.clone()));

        // Launch both initializers without waiting on each other, then
        // join both outcomes before touching the network service.
        let sql_task = tokio::spawn(init_relational(
            options.data_dir.clone(),
            ctx.clone(),
            sql_signal,
        ));
        let doc_task = tokio::spawn(init_document(
            options.data_dir.clone(),
            ctx.clone(),
            doc_signal,
        ));
        let _ = tokio::join!(sql_task, doc_task);

        let both_ready = ctx.gate.snapshot(StoreKind::Relational) == ReadinessState::Ready
            && ctx.gate.snapshot(StoreKind::Document) == ReadinessState::Ready;
        if both_ready && options.serve_http {
            let server = HttpServer::start(ctx.clone()).await?;
            let port = ctx.adopt_http(server).await;
            info!(port, "core started");
        } else if !both_ready {
            warn!("a store failed to initialize; HTTP service not started");
        }

        Ok(Host {
            client,
            ctx,
            dispatch_loop,
        })
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Restart the HTTP service after a `stop_http`. Used by hosts that
    /// cycle the embedded server; a fresh ephemeral port is assigned.
    pub async fn start_http(&self) -> Result<u16> {
        if let Some(port) = self.ctx.server_port().await {
            return Ok(port);
        }
        let server = HttpServer::start(self.ctx.clone()).await?;
        Ok(self.ctx.adopt_http(server).await)
    }

    pub async fn stop_http(&self) {
        self.ctx.stop_http().await;
    }

    /// Graceful shutdown: HTTP first, then the bridge, then a best-effort
    /// store close.
    pub async fn shutdown(self) {
        self.ctx.stop_http().await;
        drop(self.client);
        if let Err(e) = self.dispatch_loop.await {
            error!(error = %e, "dispatch loop ended abnormally");
        }
        self.ctx.close_stores().await;
        info!("core stopped");
    }
}

async fn init_relational(data_dir: PathBuf, ctx: Arc<AppContext>, signal: ReadySignal) {
    match SqlStore::open(&data_dir).await {
        Ok(store) => {
            if !ctx.install_sql(store) {
                // A handle already exists; keep the first, never two.
                warn!("relational store already installed, dropping duplicate");
            }
            signal.ready();
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "relational store initialization failed");
            signal.failed(format!("{e:#}"));
        }
    }
}

async fn init_document(data_dir: PathBuf, ctx: Arc<AppContext>, signal: ReadySignal) {
    // redb's open is blocking; keep it off the async workers.
    let opened = tokio::task::spawn_blocking(move || DocStore::open(&data_dir)).await;
    match opened {
        Ok(Ok(store)) => {
            if !ctx.install_docs(store) {
                warn!("document store already installed, dropping duplicate");
            }
            signal.ready();
        }
        Ok(Err(e)) => {
            error!(error = %format!("{e:#}"), "document store initialization failed");
            signal.failed(format!("{e:#}"));
        }
        Err(e) => {
            error!(error = %e, "document store initializer panicked");
            signal.failed(e.to_string());
        }
    }
}
