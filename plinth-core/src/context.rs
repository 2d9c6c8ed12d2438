//! Process-wide context handed to the dispatcher and the REST handlers.
//!
//! The two store handles are owned singletons: installed exactly once by
//! their initializers, reachable only through here, never module globals.

use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::document::DocStore;
use crate::ready::ReadyGate;
use crate::relational::SqlStore;
use crate::server::HttpServer;

pub struct AppContext {
    pub gate: ReadyGate,
    sql: OnceLock<SqlStore>,
    docs: OnceLock<DocStore>,
    http: Mutex<Option<HttpServer>>,
}

impl AppContext {
    pub fn new(gate: ReadyGate) -> Arc<Self> {
        Arc::new(Self {
            gate,
            sql: OnceLock::new(),
            docs: OnceLock::new(),
            http: Mutex::new(None),
        })
    }

    /// Install the relational handle. Returns false if one already exists;
    /// a second initialization must not produce a second handle.
    pub fn install_sql(&self, store: SqlStore) -> bool {
        self.sql.set(store).is_ok()
    }

    pub fn install_docs(&self, store: DocStore) -> bool {
        self.docs.set(store).is_ok()
    }

    /// The relational store, for callers that already passed the gate.
    pub fn sql(&self) -> Option<&SqlStore> {
        self.sql.get()
    }

    pub fn docs(&self) -> Option<&DocStore> {
        self.docs.get()
    }

    /// Hand the freshly started HTTP server to the context. Returns the
    /// bound port.
    pub async fn adopt_http(&self, server: HttpServer) -> u16 {
        let port = server.port();
        *self.http.lock().await = Some(server);
        port
    }

    /// Currently bound ephemeral port, if the server is running.
    pub async fn server_port(&self) -> Option<u16> {
        self.http.lock().await.as_ref().map(|s| s.port())
    }

    /// Stop the HTTP server. Idempotent; a no-op when it never started.
    pub async fn stop_http(&self) {
        let server = self.http.lock().await.take();
        if let Some(server) = server {
            server.stop().await;
        }
    }

    /// Best-effort store close at process shutdown.
    pub async fn close_stores(&self) {
        if let Some(sql) = self.sql.get() {
            sql.close().await;
        }
        // The document store closes on drop.
    }
}
