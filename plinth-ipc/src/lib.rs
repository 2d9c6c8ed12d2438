//! plinth-ipc - boundary-channel protocol shared by the core process and its UI host.
//!
//! The UI side never touches a store directly: it serializes one of the
//! [`Request`] variants, sends it across the bridge and gets exactly one
//! [`Reply`] back. The operation set is closed - an unknown `op` tag fails
//! at deserialization, before it can reach a handler.

pub mod bridge;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use bridge::{BridgeClient, BridgeServer, Envelope, channel};

/// A named operation crossing the boundary channel.
///
/// Tagged by operation name on the wire, e.g.
/// `{"op": "db-get", "query": "SELECT ...", "params": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Execute a statement on the relational store; returns `lastID`/`changes`.
    DbRun {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// Fetch the first row of a parameterized query, or null.
    DbGet {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// Fetch all rows of a parameterized query.
    DbAll {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// Alias of `db-all`, kept as a distinct operation name.
    DbQuery {
        query: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// Read the value stored at a slash-delimited path, subtree included.
    TreeGet { path: String },
    /// Replace the value (and any existing subtree) at a path.
    TreeSet { path: String, data: Value },
    /// Append `data` under a freshly generated child key; returns the key.
    TreePush { path: String, data: Value },
    /// Shallow-merge object fields into the value at a path.
    TreeUpdate { path: String, updates: Value },
    /// Remove the value at a path together with its subtree.
    TreeRemove { path: String },
    /// Enumerate children of a path with an in-memory `{filter, limit}` pass.
    TreeQuery {
        path: String,
        #[serde(default)]
        options: QueryOptions,
    },
    /// Document store status snapshot.
    TreeStats,
    /// Currently bound HTTP port, or null when the server is not running.
    ServerPort,
    /// Core process version string.
    AppVersion,
    /// Read a UTF-8 file on behalf of the UI.
    ReadFile { path: String },
    /// Write a UTF-8 file on behalf of the UI.
    WriteFile { path: String, content: String },
}

impl Request {
    /// Wire-level operation name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::DbRun { .. } => "db-run",
            Request::DbGet { .. } => "db-get",
            Request::DbAll { .. } => "db-all",
            Request::DbQuery { .. } => "db-query",
            Request::TreeGet { .. } => "tree-get",
            Request::TreeSet { .. } => "tree-set",
            Request::TreePush { .. } => "tree-push",
            Request::TreeUpdate { .. } => "tree-update",
            Request::TreeRemove { .. } => "tree-remove",
            Request::TreeQuery { .. } => "tree-query",
            Request::TreeStats => "tree-stats",
            Request::ServerPort => "server-port",
            Request::AppVersion => "app-version",
            Request::ReadFile { .. } => "read-file",
            Request::WriteFile { .. } => "write-file",
        }
    }
}

/// Options for `tree-query`: equality filter over top-level fields plus a
/// result cap, both applied in memory after a full path read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// The uniform result envelope. Every dispatched operation resolves to
/// exactly one `Reply`; nothing else crosses the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, rename = "lastID", skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// Bare success, no payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            key: None,
            last_id: None,
            changes: None,
            error: None,
        }
    }

    /// Success carrying a data payload.
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    /// Success of a `tree-push`, carrying the generated key.
    pub fn pushed(key: String) -> Self {
        Self {
            key: Some(key),
            ..Self::ok()
        }
    }

    /// Success of a `db-run`, carrying rowid and affected-row count.
    pub fn executed(last_id: i64, changes: u64) -> Self {
        Self {
            last_id: Some(last_id),
            changes: Some(changes),
            ..Self::ok()
        }
    }

    /// Failure with a message. The only non-success shape.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            key: None,
            last_id: None,
            changes: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_tagged_by_operation_name() {
        let req = Request::DbGet {
            query: "SELECT value FROM settings WHERE key = ?".into(),
            params: vec![json!("theme")],
        };
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["op"], "db-get");
        assert_eq!(wire["query"], "SELECT value FROM settings WHERE key = ?");

        let back: Request = serde_json::from_value(wire).unwrap();
        assert_eq!(back.name(), "db-get");
    }

    #[test]
    fn unknown_operation_rejected_at_the_boundary() {
        let wire = json!({"op": "drop-all-tables"});
        assert!(serde_json::from_value::<Request>(wire).is_err());
    }

    #[test]
    fn params_default_to_empty() {
        let req: Request =
            serde_json::from_value(json!({"op": "db-all", "query": "SELECT 1"})).unwrap();
        match req {
            Request::DbAll { params, .. } => assert!(params.is_empty()),
            other => panic!("unexpected variant: {}", other.name()),
        }
    }

    #[test]
    fn reply_success_shape() {
        let wire = serde_json::to_value(Reply::executed(7, 1)).unwrap();
        assert_eq!(wire, json!({"success": true, "lastID": 7, "changes": 1}));
    }

    #[test]
    fn reply_failure_shape() {
        let wire = serde_json::to_value(Reply::fail("store not initialized")).unwrap();
        assert_eq!(
            wire,
            json!({"success": false, "error": "store not initialized"})
        );
    }

    #[test]
    fn query_options_accept_partial_objects() {
        let opts: QueryOptions = serde_json::from_value(json!({"limit": 3})).unwrap();
        assert_eq!(opts.limit, Some(3));
        assert!(opts.filter.is_none());
    }
}
