//! Hierarchical document store on redb.
//!
//! Records are addressed by slash-delimited paths (`users/<key>`,
//! `settings`); each record is one JSON value under its exact path key.
//! Reads reassemble subtrees from the descendant keys, queries are a full
//! path read with an in-memory post-filter - there is no secondary index,
//! by scope.

use std::path::{Path, PathBuf};

use anyhow::Result;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use ulid::Ulid;

use crate::paths::APP_NAME;
use plinth_ipc::QueryOptions;

const DB_FILE: &str = "tree.redb";
const TABLE_TREE: TableDefinition<&str, &[u8]> = TableDefinition::new("tree");

pub struct DocStore {
    db: Database,
    path: PathBuf,
}

impl DocStore {
    /// Open (or create) the tree under `data_dir`. The first committed
    /// write transaction doubles as the durability probe; only after it
    /// lands is the store ready. Retries the open exactly once, with the
    /// repair callback wired for visibility.
    pub fn open(data_dir: &Path) -> Result<Self> {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "data directory creation failed");
        }

        let db_path = data_dir.join(DB_FILE);
        let db = match Database::create(&db_path) {
            Ok(db) => db,
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "open failed, retrying with repair");
                let mut builder = Database::builder();
                builder.set_repair_callback(|session| {
                    warn!(progress = session.progress(), "repairing document store");
                });
                builder.create(&db_path)?
            }
        };

        let txn = db.begin_write()?;
        txn.open_table(TABLE_TREE)?;
        txn.commit()?;
        info!(path = %db_path.display(), "document store ready");

        let store = Self { db, path: db_path };
        store.seed();
        Ok(store)
    }

    /// Fixed-key demo content, insert-if-absent so re-running never
    /// duplicates. Failures only warn.
    fn seed(&self) {
        let records = [
            (
                "users/demo-user",
                json!({
                    "name": "Demo User",
                    "email": "demo@example.com",
                    "status": "active",
                    "level": 5,
                    "tags": ["developer", "desktop"],
                }),
            ),
            (
                "users/demo-user-fixed",
                json!({
                    "name": "Fixed Demo User",
                    "email": "fixed@example.com",
                    "status": "active",
                    "level": 3,
                    "tags": ["manager", "project-lead"],
                }),
            ),
            (
                "settings",
                json!({
                    "theme": "dark",
                    "language": "en",
                    "notifications": true,
                    "version": "1.0.0",
                }),
            ),
            (
                "demo/test-value",
                json!({"note": "document store seed probe"}),
            ),
        ];

        for (path, value) in records {
            if let Err(e) = self.insert_absent(path, &value) {
                warn!(path, error = %e, "seeding document record failed");
            }
        }
    }

    fn insert_absent(&self, path: &str, value: &Value) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_TREE)?;
            if table.get(path)?.is_none() {
                let bytes = serde_json::to_vec(value)?;
                table.insert(path, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Value at `path`, with descendant keys folded back into a nested
    /// object. `None` when nothing is stored there.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE_TREE)?;

        let mut root = match table.get(path)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };

        let prefix = format!("{path}/");
        let upper = subtree_upper_bound(path);
        for item in table.range(prefix.as_str()..upper.as_str())? {
            let (key, value) = item?;
            let rel = &key.value()[prefix.len()..];
            let child: Value = serde_json::from_slice(value.value())?;
            insert_nested(root.get_or_insert_with(|| Value::Object(Map::new())), rel, child);
        }

        Ok(root)
    }

    /// Replace the value at `path`, discarding any existing subtree.
    pub fn set(&self, path: &str, data: &Value) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_TREE)?;
            remove_subtree(&mut table, path)?;
            let bytes = serde_json::to_vec(data)?;
            table.insert(path, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Store `data` under a freshly generated child key and return the key.
    /// ULIDs keep sibling keys unique and time-ordered.
    pub fn push(&self, path: &str, data: &Value) -> Result<String> {
        let key = Ulid::new().to_string();
        let child_path = format!("{path}/{key}");
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_TREE)?;
            let bytes = serde_json::to_vec(data)?;
            table.insert(child_path.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(key)
    }

    /// Shallow-merge object fields into the record at `path`. A missing or
    /// non-object record is treated as an empty object.
    pub fn update(&self, path: &str, updates: &Value) -> Result<()> {
        let Value::Object(updates) = updates else {
            anyhow::bail!("update payload must be an object");
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_TREE)?;
            let mut current = match table.get(path)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Value::Object(Map::new()),
            };
            if !current.is_object() {
                current = Value::Object(Map::new());
            }
            let map = current.as_object_mut().unwrap();
            for (k, v) in updates {
                map.insert(k.clone(), v.clone());
            }
            let bytes = serde_json::to_vec(&current)?;
            table.insert(path, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Delete the record at `path` and its whole subtree.
    pub fn remove(&self, path: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE_TREE)?;
            remove_subtree(&mut table, path)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Children of `path` as `{key, ...fields}` entries, post-filtered in
    /// memory per `options`.
    pub fn query(&self, path: &str, options: &QueryOptions) -> Result<Vec<Value>> {
        let node = self.get(path)?;

        let mut entries: Vec<Value> = match node {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| flatten_entry(key, value))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            // A primitive leaf becomes a single keyed entry.
            Some(value) => {
                let key = path.rsplit('/').next().unwrap_or(path).to_string();
                vec![flatten_entry(key, value)]
            }
        };

        if let Some(filter) = &options.filter {
            entries.retain(|entry| {
                filter
                    .iter()
                    .all(|(field, expected)| entry.get(field) == Some(expected))
            });
        }
        if let Some(limit) = options.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }

    /// Status snapshot for the `tree-stats` operation.
    pub fn stats(&self) -> Value {
        json!({
            "connected": true,
            "dbName": APP_NAME,
            "path": self.path.display().to_string(),
            "initialized": true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `'0'` is the successor of `'/'` in byte order, so `path/` .. `path0`
/// brackets exactly the descendant keys.
fn subtree_upper_bound(path: &str) -> String {
    format!("{path}0")
}

fn remove_subtree(table: &mut redb::Table<'_, &'static str, &'static [u8]>, path: &str) -> Result<()> {
    table.remove(path)?;
    let prefix = format!("{path}/");
    let upper = subtree_upper_bound(path);
    let descendants: Vec<String> = table
        .range(prefix.as_str()..upper.as_str())?
        .map(|item| item.map(|(k, _)| k.value().to_string()))
        .collect::<Result<_, _>>()?;
    for key in descendants {
        table.remove(key.as_str())?;
    }
    Ok(())
}

/// Graft `value` into `root` at the relative slash path `rel`.
fn insert_nested(root: &mut Value, rel: &str, value: Value) {
    let mut node = root;
    let mut segments = rel.split('/').peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let map = node.as_object_mut().unwrap();
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// `{key, ...fields}` for object records, `{key, value}` for primitives.
fn flatten_entry(key: String, value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entry = Map::new();
            entry.insert("key".into(), Value::String(key));
            for (k, v) in fields {
                entry.insert(k, v);
            }
            Value::Object(entry)
        }
        other => json!({"key": key, "value": other}),
    }
}
