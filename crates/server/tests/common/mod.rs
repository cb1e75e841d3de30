//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real orchestrator whose collaborators are all mocks, so the
//! full submit/poll flow runs without any external service.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use toonmill_core::{
    create_audit_system, load_config_from_str, AuditStore, Collaborators, ComicOrchestrator,
    SqliteAuditStore, SqliteTaskStore, TaskStore,
    testing::{MockAnalyzer, MockArtifactStore, MockImageGenerator, MockNotifier},
};
use toonmill_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use toonmill_core::testing::fixtures;

/// Test fixture with mock collaborators behind a real orchestrator.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/comics", json!({ "text": "hi" })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
#[allow(dead_code)]
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock analyzer - configure validation and scenarios
    pub analyzer: Arc<MockAnalyzer>,
    /// Mock image generator - control renders and failures
    pub images: Arc<MockImageGenerator>,
    /// Mock artifact store - inspect stored images
    pub artifacts: Arc<MockArtifactStore>,
    /// Mock notifier - inspect operator notifications
    pub notifier: MockNotifier,
    pub orchestrator: Arc<ComicOrchestrator>,
    pub audit_store: Arc<dyn AuditStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = load_config_from_str(&format!(
            r#"
[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

[analyzer]
api_key = "analyzer-secret"

[image]
api_key = "image-secret"

[storage]
root = "{}"
public_base_url = "https://cdn.example.com/comics"

[notifier.telegram]
bot_token = "telegram-secret"
chat_id = "-100123"
"#,
            db_path.display(),
            temp_dir.path().join("artifacts").display()
        ))
        .expect("Failed to parse test config");

        // Create mocks
        let analyzer = Arc::new(MockAnalyzer::new());
        let images = Arc::new(MockImageGenerator::new());
        let artifacts = Arc::new(MockArtifactStore::new());
        let notifier = MockNotifier::new();

        // Create stores
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let task_store: Arc<dyn TaskStore> =
            Arc::new(SqliteTaskStore::new(&db_path).expect("Failed to create task store"));

        // Create audit system
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);

        // Spawn audit writer
        tokio::spawn(audit_writer.run());

        let orchestrator = Arc::new(ComicOrchestrator::new(
            config.orchestrator.clone(),
            task_store,
            Collaborators {
                analyzer: analyzer.clone(),
                generator: images.clone(),
                sheet_generator: None,
                artifacts: artifacts.clone(),
                notifier: Arc::new(notifier.clone()),
            },
            Some(audit_handle),
        ));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&orchestrator),
            Arc::clone(&audit_store),
        ));

        // Create router
        let router = toonmill_server::api::create_router(state);

        Self {
            router,
            analyzer,
            images,
            artifacts,
            notifier,
            orchestrator,
            audit_store,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll the status endpoint until the task reaches `expected` or a
    /// different terminal state.
    pub async fn wait_for_status(&self, task_id: &str, expected: &str) -> Value {
        let path = format!("/api/v1/comics/{}/status", task_id);
        let mut last = Value::Null;
        for _ in 0..500 {
            let response = self.get(&path).await;
            last = response.body;
            let status = last["status"].as_str().unwrap_or_default();
            if status == expected
                || matches!(status, "completed" | "failed" | "rejected")
            {
                return last;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        last
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
