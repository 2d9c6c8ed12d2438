//! Boundary-channel integration tests: a full Host booted against a temp
//! data directory, exercised through the same envelope the UI would use.

use serde_json::{Value, json};
use tempfile::TempDir;

use plinth_core::host::{Host, HostOptions};
use plinth_ipc::{QueryOptions, Request};

async fn boot(dir: &TempDir) -> Host {
    Host::start(HostOptions::new(dir.path()))
        .await
        .expect("host boots")
}

#[tokio::test]
async fn relational_round_trip_over_the_bridge() {
    let dir = TempDir::new().unwrap();
    let host = boot(&dir).await;

    let reply = host
        .client
        .call(Request::DbRun {
            query: "INSERT INTO settings (key, value) VALUES (?, ?)".into(),
            params: vec![json!("motd"), json!("hello from the bridge")],
        })
        .await;
    assert!(reply.success, "insert failed: {:?}", reply.error);
    assert_eq!(reply.changes, Some(1));

    let reply = host
        .client
        .call(Request::DbGet {
            query: "SELECT value FROM settings WHERE key = ?".into(),
            params: vec![json!("motd")],
        })
        .await;
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["value"], json!("hello from the bridge"));

    host.shutdown().await;
}

#[tokio::test]
async fn document_operations_over_the_bridge() {
    let dir = TempDir::new().unwrap();
    let host = boot(&dir).await;

    let reply = host
        .client
        .call(Request::TreeSet {
            path: "projects/alpha".into(),
            data: json!({"v": 1, "owner": "ada"}),
        })
        .await;
    assert!(reply.success);

    let reply = host
        .client
        .call(Request::TreePush {
            path: "projects".into(),
            data: json!({"v": 2, "owner": "grace"}),
        })
        .await;
    assert!(reply.success);
    let key = reply.key.expect("push returns a key");

    let reply = host
        .client
        .call(Request::TreeGet {
            path: format!("projects/{key}"),
        })
        .await;
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["owner"], json!("grace"));

    // In-memory post-filter with a limit of one.
    let reply = host
        .client
        .call(Request::TreeQuery {
            path: "projects".into(),
            options: QueryOptions {
                filter: Some(
                    json!({"v": 1})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
                limit: Some(1),
            },
        })
        .await;
    assert!(reply.success);
    let hits = reply.data.unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["v"], json!(1));

    let reply = host.client.call(Request::TreeStats).await;
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["connected"], json!(true));

    host.shutdown().await;
}

#[tokio::test]
async fn rebooting_the_same_data_dir_does_not_duplicate_seed() {
    let dir = TempDir::new().unwrap();

    let first = boot(&dir).await;
    first.shutdown().await;

    let second = boot(&dir).await;

    let reply = second
        .client
        .call(Request::DbGet {
            query: "SELECT COUNT(*) AS n FROM settings WHERE key = 'theme'".into(),
            params: vec![],
        })
        .await;
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["n"], json!(1));

    let reply = second
        .client
        .call(Request::TreeQuery {
            path: "users".into(),
            options: QueryOptions::default(),
        })
        .await;
    assert!(reply.success);
    assert_eq!(reply.data.unwrap().as_array().unwrap().len(), 2);

    second.shutdown().await;
}

#[tokio::test]
async fn every_request_yields_exactly_one_shaped_reply() {
    let dir = TempDir::new().unwrap();
    let host = boot(&dir).await;

    // A handler fault folds into a failure reply, never a dropped call.
    let reply = host
        .client
        .call(Request::DbRun {
            query: "NOT EVEN SQL".into(),
            params: vec![],
        })
        .await;
    assert!(!reply.success);
    assert!(reply.error.is_some());

    let reply = host.client.call(Request::AppVersion).await;
    assert!(reply.success);
    assert!(reply.error.is_none());

    host.shutdown().await;
}

#[tokio::test]
async fn server_port_tracks_the_http_lifecycle() {
    let dir = TempDir::new().unwrap();
    let host = boot(&dir).await;

    let reply = host.client.call(Request::ServerPort).await;
    assert!(reply.success);
    let port = reply.data.unwrap().as_u64().expect("port bound after boot");
    assert!(port > 0);

    host.stop_http().await;
    let reply = host.client.call(Request::ServerPort).await;
    assert!(reply.success);
    assert_eq!(reply.data, Some(Value::Null));

    // Stop is idempotent.
    host.stop_http().await;

    let new_port = host.start_http().await.unwrap();
    assert!(new_port > 0);

    host.shutdown().await;
}

#[tokio::test]
async fn second_install_never_creates_a_second_handle() {
    use plinth_core::{AppContext, ReadyGate};

    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let ctx = AppContext::new(ReadyGate::new());

    let first = plinth_core::relational::SqlStore::open(dir_a.path())
        .await
        .unwrap();
    let second = plinth_core::relational::SqlStore::open(dir_b.path())
        .await
        .unwrap();

    assert!(ctx.install_sql(first));
    assert!(!ctx.install_sql(second));
    assert!(ctx.sql().unwrap().path().starts_with(dir_a.path()));
}
