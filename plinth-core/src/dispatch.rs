//! Operation dispatcher.
//!
//! Maps every boundary-channel request to its handler, waits on the
//! readiness gate for the stores the operation touches, and folds every
//! outcome - including handler faults - into the uniform reply envelope.
//! Nothing escapes across the boundary unhandled.

use std::sync::Arc;

use anyhow::Context as _;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::context::AppContext;
use crate::ready::StoreKind;
use plinth_ipc::{Reply, Request};

/// Fixed message every gated operation returns when its store is down.
const STORE_NOT_INITIALIZED: &str = "store not initialized";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store not initialized")]
    StoreNotInitialized,
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}

pub struct Dispatcher {
    ctx: Arc<AppContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    /// Resolve one request to exactly one reply.
    pub async fn dispatch(&self, request: Request) -> Reply {
        for kind in Self::dependencies(&request) {
            if let Err(reason) = self.ctx.gate.wait(*kind).await {
                debug!(op = request.name(), store = %kind, reason, "rejecting: store unavailable");
                return Reply::fail(STORE_NOT_INITIALIZED);
            }
        }

        match self.handle(request).await {
            Ok(reply) => reply,
            Err(DispatchError::StoreNotInitialized) => Reply::fail(STORE_NOT_INITIALIZED),
            Err(DispatchError::Operation(e)) => Reply::fail(format!("{e:#}")),
        }
    }

    /// Stores an operation depends on. Zero or one today; the gate loop
    /// above copes with any number.
    fn dependencies(request: &Request) -> &'static [StoreKind] {
        match request {
            Request::DbRun { .. }
            | Request::DbGet { .. }
            | Request::DbAll { .. }
            | Request::DbQuery { .. } => &[StoreKind::Relational],
            Request::TreeGet { .. }
            | Request::TreeSet { .. }
            | Request::TreePush { .. }
            | Request::TreeUpdate { .. }
            | Request::TreeRemove { .. }
            | Request::TreeQuery { .. }
            | Request::TreeStats => &[StoreKind::Document],
            Request::ServerPort
            | Request::AppVersion
            | Request::ReadFile { .. }
            | Request::WriteFile { .. } => &[],
        }
    }

    async fn handle(&self, request: Request) -> Result<Reply, DispatchError> {
        match request {
            Request::DbRun { query, params } => {
                let (last_id, changes) = self.sql()?.run(&query, &params).await?;
                Ok(Reply::executed(last_id, changes))
            }
            Request::DbGet { query, params } => {
                let row = self.sql()?.get(&query, &params).await?;
                Ok(Reply::with_data(row.unwrap_or(Value::Null)))
            }
            Request::DbAll { query, params } | Request::DbQuery { query, params } => {
                let rows = self.sql()?.all(&query, &params).await?;
                Ok(Reply::with_data(Value::Array(rows)))
            }
            Request::TreeGet { path } => {
                let value = self.docs()?.get(&path)?;
                Ok(Reply::with_data(value.unwrap_or(Value::Null)))
            }
            Request::TreeSet { path, data } => {
                self.docs()?.set(&path, &data)?;
                Ok(Reply::ok())
            }
            Request::TreePush { path, data } => {
                let key = self.docs()?.push(&path, &data)?;
                Ok(Reply::pushed(key))
            }
            Request::TreeUpdate { path, updates } => {
                self.docs()?.update(&path, &updates)?;
                Ok(Reply::ok())
            }
            Request::TreeRemove { path } => {
                self.docs()?.remove(&path)?;
                Ok(Reply::ok())
            }
            Request::TreeQuery { path, options } => {
                let entries = self.docs()?.query(&path, &options)?;
                Ok(Reply::with_data(Value::Array(entries)))
            }
            Request::TreeStats => Ok(Reply::with_data(self.docs()?.stats())),
            Request::ServerPort => {
                let port = self.ctx.server_port().await;
                Ok(Reply::with_data(port.map_or(Value::Null, |p| json!(p))))
            }
            Request::AppVersion => Ok(Reply::with_data(json!(env!("CARGO_PKG_VERSION")))),
            Request::ReadFile { path } => {
                let data = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {path}"))?;
                Ok(Reply::with_data(Value::String(data)))
            }
            Request::WriteFile { path, content } => {
                tokio::fs::write(&path, content)
                    .await
                    .with_context(|| format!("writing {path}"))?;
                Ok(Reply::ok())
            }
        }
    }

    fn sql(&self) -> Result<&crate::relational::SqlStore, DispatchError> {
        self.ctx.sql().ok_or(DispatchError::StoreNotInitialized)
    }

    fn docs(&self) -> Result<&crate::document::DocStore, DispatchError> {
        self.ctx.docs().ok_or(DispatchError::StoreNotInitialized)
    }
}
