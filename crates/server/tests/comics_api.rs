//! Comic API tests.
//!
//! Drive the HTTP surface in-process: submit, poll status, fetch results and
//! list tasks, with every external service mocked.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};
use toonmill_core::{analyzer::ValidationResult, ImageData, Notification};

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let fixture = TestFixture::new().await;
    fixture.analyzer.set_scenario(fixtures::episodes(3)).await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["messages"][0], "Drawing your comic!");

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let snapshot = fixture.wait_for_status(&task_id, "completed").await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["is_valid"], true);
    assert!(snapshot["character_sheet_url"].is_string());

    let response = fixture.get(&format!("/api/v1/comics/{}", task_id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["episodes"].as_array().unwrap().len(), 3);
    let urls = response.body["image_urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);
    assert!(response.body["error_message"].is_null());
}

#[tokio::test]
async fn test_rejected_submission_returns_400() {
    let fixture = TestFixture::new().await;
    fixture
        .analyzer
        .set_validation(ValidationResult::reject("Please send a story, not a recipe."))
        .await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": "2 eggs, 1 cup flour" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "rejected");
    assert_eq!(
        response.body["reject_reason"],
        "Please send a story, not a recipe."
    );

    let task_id = response.body["task_id"].as_str().unwrap();
    let status = fixture
        .get(&format!("/api/v1/comics/{}/status", task_id))
        .await;
    assert_eq!(status.body["status"], "rejected");
    assert_eq!(status.body["is_valid"], false);
    assert!(fixture
        .notifier
        .sent_for(task_id)
        .iter()
        .any(|n| matches!(n, Notification::TaskRejected { .. })));
}

#[tokio::test]
async fn test_empty_text_is_rejected_without_images() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/comics", json!({})).await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "rejected");
    assert_eq!(fixture.analyzer.call_count("validate").await, 0);
}

#[tokio::test]
async fn test_too_many_attachments_returns_400() {
    let fixture = TestFixture::new().await;
    let image = ImageData::png(vec![0x89, b'P', b'N', b'G']).to_base64();

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({ "text": "a story", "images": [image, image, image, image] }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("too many attachments"));

    let list = fixture.get("/api/v1/comics").await;
    assert_eq!(list.body["total"], 0);
}

#[tokio::test]
async fn test_invalid_base64_image_returns_400() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({ "text": "a story", "images": ["not base64!!"] }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("image 0"));
}

#[tokio::test]
async fn test_non_image_data_url_returns_400() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({ "text": "a story", "images": ["data:text/html;base64,PGI+aGk8L2I+"] }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    let error = response.body["error"].as_str().unwrap();
    assert!(error.contains("image 0"));
    assert!(error.contains("text/html"));
    assert_eq!(fixture.get("/api/v1/comics").await.body["total"], 0);
}

/// Serve a few fixed responses on an ephemeral port.
async fn spawn_image_host() -> String {
    use axum::{http::header, routing::get, Router};

    let png = vec![0x89, b'P', b'N', b'G'];
    let app = Router::new()
        .route(
            "/board",
            get({
                move || {
                    let png = png.clone();
                    async move { ([(header::CONTENT_TYPE, "image/png")], png) }
                }
            }),
        )
        .route(
            "/whiteboard.jpg",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    vec![0xFF, 0xD8, 0xFF, 0xE0],
                )
            }),
        )
        .route(
            "/page",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<p>hello</p>") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_image_urls_are_downloaded_and_failures_skipped() {
    let fixture = TestFixture::new().await;
    let host = spawn_image_host().await;

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({
                "text": fixtures::meeting_notes(),
                "image_urls": [
                    format!("{}/board", host),
                    format!("{}/page", host),
                    format!("{}/missing.png", host),
                    format!("{}/whiteboard.jpg", host),
                ],
            }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let snapshot = fixture.wait_for_status(&task_id, "completed").await;
    assert_eq!(snapshot["attachment_count"], 2);

    let calls = fixture.analyzer.recorded_calls().await;
    assert!(calls.iter().all(|c| c.image_count == 2));
}

#[tokio::test]
async fn test_downloaded_images_count_toward_attachment_limit() {
    let fixture = TestFixture::new().await;
    let host = spawn_image_host().await;
    let image = ImageData::png(vec![1, 2, 3]).to_base64();

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({
                "text": "a story",
                "images": [image, image],
                "image_urls": [format!("{}/board", host), format!("{}/whiteboard.jpg", host)],
            }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("too many attachments"));
}

#[tokio::test]
async fn test_only_first_five_image_urls_are_fetched() {
    let fixture = TestFixture::new().await;
    let host = spawn_image_host().await;

    // Five unusable URLs first; the good one after them is never fetched.
    let mut urls: Vec<String> = (0..5).map(|_| format!("{}/page", host)).collect();
    urls.push(format!("{}/board", host));

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({ "text": fixtures::meeting_notes(), "image_urls": urls }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let snapshot = fixture.wait_for_status(&task_id, "completed").await;
    assert_eq!(snapshot["attachment_count"], 0);
}

#[tokio::test]
async fn test_attachments_are_stored() {
    let fixture = TestFixture::new().await;
    let image = format!(
        "data:image/png;base64,{}",
        ImageData::png(vec![1, 2, 3]).to_base64()
    );

    let response = fixture
        .post(
            "/api/v1/comics",
            json!({ "text": fixtures::meeting_notes(), "images": [image] }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let snapshot = fixture.wait_for_status(&task_id, "completed").await;
    assert_eq!(snapshot["attachment_count"], 1);

    // The upload runs beside the render and may land slightly later.
    let mut urls = snapshot["attachment_urls"].clone();
    for _ in 0..100 {
        if urls.as_array().map_or(false, |a| a.len() == 1) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        urls = fixture
            .get(&format!("/api/v1/comics/{}/status", task_id))
            .await
            .body["attachment_urls"]
            .clone();
    }
    assert_eq!(urls.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_validation_service_error_returns_502() {
    let fixture = TestFixture::new().await;
    fixture
        .analyzer
        .fail_validation(3, fixtures::overloaded())
        .await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);

    // The task was created and stays pending.
    let list = fixture.get("/api/v1/comics?status=pending").await;
    assert_eq!(list.body["total"], 1);
}

#[tokio::test]
async fn test_failed_render_reports_classified_message() {
    let fixture = TestFixture::new().await;
    fixture.analyzer.set_scenario(fixtures::episodes(1)).await;
    fixture.images.fail_next(3, fixtures::rate_limited()).await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let snapshot = fixture.wait_for_status(&task_id, "failed").await;
    assert_eq!(snapshot["status"], "failed");
    let message = snapshot["error_message"].as_str().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("RESOURCE_EXHAUSTED"));

    let result = fixture.get(&format!("/api/v1/comics/{}", task_id)).await;
    assert_status!(result, StatusCode::OK);
    assert_eq!(result.body["status"], "failed");
    assert!(result.body["image_urls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_task_returns_404() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .get("/api/v1/comics/00000000-0000-0000-0000-000000000000/status")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture
        .get("/api/v1/comics/00000000-0000-0000-0000-000000000000")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_refused() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/v1/comics", "{ not json").await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let fixture = TestFixture::new().await;

    let accepted = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    let task_id = accepted.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_status(&task_id, "completed").await;

    fixture
        .analyzer
        .set_validation(ValidationResult::reject("not a story"))
        .await;
    fixture
        .post("/api/v1/comics", json!({ "text": "asdf" }))
        .await;

    let all = fixture.get("/api/v1/comics").await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["total"], 2);
    assert_eq!(all.body["limit"], 100);

    let completed = fixture.get("/api/v1/comics?status=completed").await;
    assert_eq!(completed.body["total"], 1);
    assert_eq!(completed.body["tasks"][0]["id"], task_id.as_str());

    let rejected = fixture.get("/api/v1/comics?status=rejected&limit=5").await;
    assert_eq!(rejected.body["total"], 1);
    assert_eq!(rejected.body["limit"], 5);
    assert_eq!(rejected.body["tasks"][0]["input_preview"], "asdf");

    let invalid = fixture.get("/api/v1/comics?status=done").await;
    assert_status!(invalid, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_audit_trail_for_task() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_status(&task_id, "completed").await;

    // The audit writer persists asynchronously.
    let path = format!(
        "/api/v1/audit?task_id={}&event_type=task_state_changed",
        task_id
    );
    let mut total = 0;
    for _ in 0..100 {
        total = fixture.get(&path).await.body["total"].as_i64().unwrap_or(0);
        if total >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    // pending -> processing -> completed
    assert_eq!(total, 2);

    let calls = fixture
        .get(&format!(
            "/api/v1/audit?task_id={}&event_type=external_call",
            task_id
        ))
        .await;
    assert!(calls.body["total"].as_i64().unwrap() >= 2);
}

#[tokio::test]
async fn test_audit_filters_external_calls() {
    let fixture = TestFixture::new().await;
    fixture.images.fail_next(1, fixtures::rate_limited()).await;

    let response = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    fixture.wait_for_status(&task_id, "completed").await;

    let failed_path = format!("/api/v1/audit?task_id={}&service=image&status=error", task_id);
    let mut failed = fixture.get(&failed_path).await;
    for _ in 0..100 {
        if failed.body["total"].as_i64().unwrap_or(0) >= 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        failed = fixture.get(&failed_path).await;
    }
    assert_eq!(failed.body["total"], 1);
    let event = &failed.body["events"][0]["data"];
    assert_eq!(event["type"], "external_call");
    assert_eq!(event["service"], "image");
    assert_eq!(event["status"], "error");

    let validations = fixture
        .get(&format!("/api/v1/audit?task_id={}&method=validate", task_id))
        .await;
    assert_eq!(validations.body["total"], 1);
    assert_eq!(validations.body["events"][0]["data"]["service"], "analyzer");

    let unknown_status = fixture.get("/api/v1/audit?status=maybe").await;
    assert_status!(unknown_status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_accepting() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["accepting"], true);

    fixture.orchestrator.shutdown().await;

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.body["status"], "shutting_down");

    let refused = fixture
        .post("/api/v1/comics", json!({ "text": fixtures::meeting_notes() }))
        .await;
    assert_status!(refused, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);

    let body = serde_json::to_string(&response.body).unwrap();
    assert!(!body.contains("analyzer-secret"));
    assert!(!body.contains("image-secret"));
    assert!(!body.contains("telegram-secret"));
    assert_eq!(response.body["analyzer"]["api_key_configured"], true);
    assert_eq!(response.body["telegram"]["bot_token_configured"], true);
    assert_eq!(response.body["telegram"]["chat_id"], "-100123");
    assert_eq!(response.body["orchestrator"]["max_input_chars"], 30000);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("toonmill_http_requests_total"));
    assert!(body.contains("toonmill_tasks_by_status"));
    assert!(body.contains("toonmill_orchestrator_accepting"));
}
