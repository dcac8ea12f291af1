use appcursor::collector::{CollectionError, Collector};
use appcursor::model::InventoryItem;
use appcursor::{AppService, Config, StartOutcome};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Returns two applications once the gate is opened.
struct GatedCollector {
    gate: Arc<Notify>,
}

#[async_trait]
impl Collector for GatedCollector {
    async fn collect(&self) -> Result<Vec<InventoryItem>, CollectionError> {
        self.gate.notified().await;
        Ok(vec![
            InventoryItem::new("Foo", "1.0", "/opt/foo", "2024-01-01"),
            InventoryItem::new("Bar", "2.0", "/opt/bar", "2024-01-02"),
        ])
    }
}

struct TestApp {
    _dir: TempDir,
    service: AppService,
    gate: Arc<Notify>,
    base: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let config = Config {
            api_port: 0,
            db_path: dir.path().join("storage.db"),
            ..Config::default()
        };
        let service = AppService::with_config(
            config,
            dir.path().join("config.toml"),
            Arc::new(GatedCollector {
                gate: Arc::clone(&gate),
            }),
        )
        .unwrap();

        let addr = service.start_api(None, None).await.unwrap().addr();

        Self {
            _dir: dir,
            service,
            gate,
            base: base_url(addr),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.post(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    /// Waits until `count` scans are recorded and the status has left
    /// `scanning`.
    async fn wait_for_scans(&self, count: usize) {
        for _ in 0..200 {
            let (_, scans) = self.get("/scans").await;
            let (_, status) = self.get("/status").await;
            let recorded = scans["data"].as_array().map(Vec::len).unwrap_or(0);
            if recorded >= count && status["data"]["state"] != "scanning" {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("scan did not finish");
    }

    /// Runs one scan through the API and waits for it.
    async fn scan(&self) {
        let (status, _) = self.post("/scan").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        self.gate.notify_one();
        self.wait_for_scans(1).await;
    }
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{}/api/v1", addr)
}

#[tokio::test]
async fn test_status_starts_idle() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["state"], "idle");
    assert_eq!(body["data"]["progress"], 0);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_scan_then_list_applications() {
    let app = TestApp::start().await;
    app.scan().await;

    let (status, body) = app.get("/applications").await;
    assert_eq!(status, StatusCode::OK);

    let inventory = &body["data"];
    assert_eq!(inventory["totalApplications"], 2);
    assert_eq!(inventory["applications"][0]["name"], "Bar");
    assert_eq!(inventory["applications"][0]["id"], "app-001");
    assert_eq!(inventory["applications"][1]["name"], "Foo");

    let (_, status_body) = app.get("/status").await;
    assert_eq!(status_body["data"]["state"], "idle");
    assert_eq!(status_body["data"]["progress"], 100);

    let (_, scans) = app.get("/scans").await;
    assert_eq!(scans["data"][0]["status"], "success");
}

#[tokio::test]
async fn test_second_scan_is_rejected_while_running() {
    let app = TestApp::start().await;

    let (first, _) = app.post("/scan").await;
    assert_eq!(first, StatusCode::ACCEPTED);

    let (second, body) = app.post("/scan").await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "SCAN_IN_PROGRESS");

    app.gate.notify_one();
    app.wait_for_scans(1).await;

    let (_, scans) = app.get("/scans").await;
    assert_eq!(scans["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_missing_application_is_404() {
    let app = TestApp::start().await;

    let resp = app
        .client
        .delete(app.url("/applications/999"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "DELETE_FAILED");
    assert!(body["error"]["message"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_delete_application_by_store_id() {
    let app = TestApp::start().await;
    app.scan().await;

    let (_, body) = app.get("/applications").await;
    let id = body["data"]["applications"][0]["storeId"].as_i64().unwrap();

    let (status, body) = app.post(&format!("/delete_app/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = app.get("/applications").await;
    assert_eq!(body["data"]["totalApplications"], 1);
    assert_eq!(body["data"]["applications"][0]["name"], "Foo");
}

#[tokio::test]
async fn test_patch_application() {
    let app = TestApp::start().await;
    app.scan().await;

    let (_, body) = app.get("/applications").await;
    let id = body["data"]["applications"][0]["storeId"].as_i64().unwrap();

    let resp = app
        .client
        .patch(app.url(&format!("/applications/{}", id)))
        .json(&serde_json::json!({ "version": "2.1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, body) = app.get("/applications").await;
    assert_eq!(body["data"]["applications"][0]["version"], "2.1");
}

#[tokio::test]
async fn test_patch_unknown_field_is_rejected() {
    let app = TestApp::start().await;
    app.scan().await;

    let resp = app
        .client
        .patch(app.url("/applications/1"))
        .json(&serde_json::json!({ "name = 'x'; --": "y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_FIELD");
}

#[tokio::test]
async fn test_send_without_remote_is_bad_gateway() {
    let app = TestApp::start().await;

    let (status, body) = app.post("/send_data").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "SEND_FAILED");
    assert_eq!(body["error"]["details"], "Remote URL not set.");
}

#[tokio::test]
async fn test_start_twice_keeps_one_server() {
    let app = TestApp::start().await;
    let addr = app.service.api_addr().await.unwrap();

    let again = app.service.start_api(None, None).await.unwrap();
    assert_eq!(again, StartOutcome::AlreadyRunning(addr));

    let (status, _) = app.get("/status").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stop_releases_listener() {
    let app = TestApp::start().await;
    let addr = app.service.api_addr().await.unwrap();

    assert!(app.service.stop_api().await.unwrap());
    assert!(!app.service.stop_api().await.unwrap());
    assert!(app.service.api_addr().await.is_none());

    let listener = tokio::net::TcpListener::bind(addr).await;
    assert!(listener.is_ok());
}

#[tokio::test]
async fn test_restart_serves_again() {
    let app = TestApp::start().await;

    let addr = app.service.restart_api().await.unwrap();

    let resp = app
        .client
        .get(format!("{}/status", base_url(addr)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn error_body(resp: reqwest::Response) -> Value {
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    body
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = TestApp::start().await;
    let url = app.url("/applications/1");

    let resp = app
        .client
        .patch(&url)
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(resp).await["error"]["code"], "BAD_REQUEST");

    let resp = app
        .client
        .patch(&url)
        .json(&serde_json::json!({ "name": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_body(resp).await["error"]["code"], "BAD_REQUEST");

    let resp = app
        .client
        .patch(&url)
        .body(r#"{"name":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = error_body(resp).await;
    assert!(body["error"]["details"].is_string());
}

#[tokio::test]
async fn test_non_numeric_id_uses_error_envelope() {
    let app = TestApp::start().await;

    let resp = app
        .client
        .delete(app.url("/applications/abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(resp).await["error"]["code"], "BAD_REQUEST");

    let (status, body) = app.post("/delete_app/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let resp = app
        .client
        .patch(app.url("/scans/abc"))
        .json(&serde_json::json!({ "status": "failed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    error_body(resp).await;
}

#[tokio::test]
async fn test_invalid_scan_status_is_rejected() {
    let app = TestApp::start().await;
    app.scan().await;

    let (_, scans) = app.get("/scans").await;
    let id = scans["data"][0]["id"].as_i64().unwrap();

    let resp = app
        .client
        .patch(app.url(&format!("/scans/{}", id)))
        .json(&serde_json::json!({ "status": "bogus" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(resp).await["error"]["code"], "INVALID_FIELD");

    let resp = app
        .client
        .patch(app.url(&format!("/scans/{}", id)))
        .json(&serde_json::json!({ "status": "failed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, scans) = app.get("/scans").await;
    assert_eq!(scans["data"][0]["status"], "failed");
}
