//! Relational store: SQLite behind an sqlx pool.
//!
//! Opened once at startup. The open step is the only part that gates
//! readiness; migration failures are fatal too, while seeding is
//! best-effort and only warns.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row};
use tracing::{info, warn};

const DB_FILE: &str = "app.sqlite";

pub struct SqlStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqlStore {
    /// Open (or create) the database under `data_dir`, run migrations and
    /// seed defaults. Retries the connect exactly once, with statement
    /// logging enabled, before giving up.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        if let Err(e) = tokio::fs::create_dir_all(data_dir).await {
            // Non-fatal: the connect below decides whether we are stuck.
            warn!(dir = %data_dir.display(), error = %e, "data directory creation failed");
        }

        let db_path = data_dir.join(DB_FILE);
        let pool = match Self::connect(&db_path, false).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "open failed, retrying verbose");
                Self::connect(&db_path, true).await?
            }
        };
        info!(path = %db_path.display(), "relational store connected");

        let store = Self {
            pool,
            path: db_path,
        };
        store.migrate().await?;
        store.seed().await;
        Ok(store)
    }

    async fn connect(db_path: &Path, verbose: bool) -> Result<SqlitePool> {
        let mut opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        opts = if verbose {
            opts.log_statements(log::LevelFilter::Debug)
        } else {
            opts.disable_statement_logging()
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Ok(pool)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Seed default settings. Idempotent by key; failures never block
    /// readiness.
    async fn seed(&self) {
        let defaults = sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings (key, value) VALUES
            ('theme', 'dark'),
            ('language', 'en'),
            ('auto_save', 'true')
            "#,
        )
        .execute(&self.pool)
        .await;
        if let Err(e) = defaults {
            warn!(error = %e, "seeding default settings failed");
        }

        // Write-then-read probe proving the store is actually durable.
        let stamp = chrono::Utc::now().to_rfc3339();
        let probe = sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('seed_probe', ?)")
            .bind(&stamp)
            .execute(&self.pool)
            .await;
        match probe {
            Ok(_) => info!(stamp, "relational store probe written"),
            Err(e) => warn!(error = %e, "relational store probe failed"),
        }
    }

    /// Execute a statement; returns `(last_insert_rowid, rows_affected)`.
    pub async fn run(&self, query: &str, params: &[Value]) -> Result<(i64, u64)> {
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_value(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok((result.last_insert_rowid(), result.rows_affected()))
    }

    /// First row of a query as a JSON object, or `None`.
    pub async fn get(&self, query: &str, params: &[Value]) -> Result<Option<Value>> {
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_value(q, p);
        }
        let row = q.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// All rows of a query as JSON objects.
    pub async fn all(&self, query: &str, params: &[Value]) -> Result<Vec<Value>> {
        let mut q = sqlx::query(query);
        for p in params {
            q = bind_value(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort close at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Bind one opaque JSON parameter the way the wire protocol delivers it.
fn bind_value<'q>(q: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else {
                q.bind(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays/objects travel as their JSON text.
        other => q.bind(other.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> Value {
    let mut map = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        // SQLite types dynamically (expressions carry no declared type), so
        // decode by value: integer, then real, then text, then blob.
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String)
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
            v.map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
        } else {
            None
        };
        map.insert(col.name().to_string(), value.unwrap_or(Value::Null));
    }
    Value::Object(map)
}
