//! plinth-core - the desktop core process.
//!
//! Owns two independent persistent stores (SQLite and a hierarchical
//! document tree) plus a transient loopback HTTP API, and exposes all of
//! them to the UI host exclusively through the plinth-ipc boundary channel.
//! This module tree is exposed for integration testing.

pub mod bridge;
pub mod context;
pub mod dispatch;
pub mod document;
pub mod host;
pub mod paths;
pub mod ready;
pub mod relational;
pub mod rest;
pub mod server;

pub use context::AppContext;
pub use dispatch::Dispatcher;
pub use host::{Host, HostOptions};
pub use ready::{ReadinessState, ReadyGate, ReadySignal, StoreKind};
