//! REST API integration tests against the real ephemeral-port server.

use serde_json::{Value, json};
use tempfile::TempDir;

use plinth_core::host::{Host, HostOptions};

struct TestServer {
    host: Host,
    base: String,
    http: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let dir = TempDir::new().unwrap();
        let host = Host::start(HostOptions::new(dir.path()))
            .await
            .expect("host boots");
        let port = host
            .context()
            .server_port()
            .await
            .expect("HTTP started once both stores are ready");
        Self {
            host,
            base: format!("http://127.0.0.1:{port}"),
            http: reqwest::Client::new(),
            _dir: dir,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
    }

    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn put_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.http
            .put(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.http
            .delete(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
    }

    async fn shutdown(self) {
        self.host.shutdown().await;
    }
}

#[tokio::test]
async fn end_to_end_health_check() {
    let server = TestServer::spawn().await;

    let response = server.get("/api/health").await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("OK"));
    let stamp = body["timestamp"].as_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(stamp).expect("parseable timestamp");

    server.shutdown().await;
}

#[tokio::test]
async fn user_crud_lifecycle() {
    let server = TestServer::spawn().await;

    let response = server
        .post_json(
            "/api/users",
            &json!({"name": "Ada Lovelace", "email": "ada@example.com"}),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert!(id > 0);

    let response = server.get("/api/users").await;
    assert_eq!(response.status(), 200);
    let users: Value = response.json().await.unwrap();
    assert!(
        users
            .as_array()
            .unwrap()
            .iter()
            .any(|u| u["email"] == json!("ada@example.com"))
    );

    let response = server.delete(&format!("/api/users/{id}")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changes"], json!(1));

    server.shutdown().await;
}

#[tokio::test]
async fn create_user_validates_before_touching_the_store() {
    let server = TestServer::spawn().await;

    let response = server
        .post_json("/api/users", &json!({"name": "No Email"}))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("Name and email are required"));

    let response = server
        .post_json("/api/users", &json!({"name": "", "email": ""}))
        .await;
    assert_eq!(response.status(), 400);

    server.shutdown().await;
}

#[tokio::test]
async fn settings_read_and_update() {
    let server = TestServer::spawn().await;

    let response = server.get("/api/settings").await;
    assert_eq!(response.status(), 200);
    let settings: Value = response.json().await.unwrap();
    assert!(
        settings
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["key"] == json!("theme")),
        "seeded theme setting missing"
    );

    let response = server
        .put_json("/api/settings/theme", &json!({"value": "light"}))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["key"], json!("theme"));
    assert_eq!(body["value"], json!("light"));

    let response = server.get("/api/settings").await;
    let settings: Value = response.json().await.unwrap();
    let theme = settings
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["key"] == json!("theme"))
        .unwrap();
    assert_eq!(theme["value"], json!("light"));

    server.shutdown().await;
}

#[tokio::test]
async fn upload_endpoint_acknowledges() {
    let server = TestServer::spawn().await;

    let response = server.post_json("/api/upload", &json!({})).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], json!("File upload endpoint ready"));

    server.shutdown().await;
}

#[tokio::test]
async fn stopped_server_refuses_connections_until_restarted() {
    let server = TestServer::spawn().await;
    let old_base = server.base.clone();

    server.host.stop_http().await;
    assert!(
        server
            .http
            .get(format!("{old_base}/api/health"))
            .send()
            .await
            .is_err(),
        "stopped server still accepting connections"
    );

    let new_port = server.host.start_http().await.unwrap();
    assert!(new_port > 0);
    let response = server
        .http
        .get(format!("http://127.0.0.1:{new_port}/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.shutdown().await;
}
