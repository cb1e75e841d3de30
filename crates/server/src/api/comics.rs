//! Comic API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toonmill_core::{
    ComicResult, ImageData, OrchestratorError, PhaseDurations, Submission, Task, TaskFilter,
    TaskStatus,
};

use crate::state::AppState;

/// Maximum allowed limit for task queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for task queries
const DEFAULT_LIMIT: i64 = 100;

/// Characters of the input text echoed back in task snapshots.
const INPUT_PREVIEW_CHARS: usize = 200;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a comic
#[derive(Debug, Deserialize)]
pub struct SubmitComicBody {
    #[serde(default)]
    pub text: String,
    /// Base64 encoded images, optionally as data URLs
    #[serde(default)]
    pub images: Vec<String>,
    /// Images to download; only the first five are fetched and failures are skipped
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitComicResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub messages: Vec<String>,
}

/// Rejected submission
#[derive(Debug, Serialize)]
pub struct RejectedComicResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub reject_reason: Option<String>,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListComicsParams {
    /// Filter by status
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Task snapshot
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
    pub input_preview: String,
    pub attachment_count: usize,
    pub attachment_urls: Vec<String>,
    pub is_valid: Option<bool>,
    pub reject_reason: Option<String>,
    pub messages: Vec<String>,
    pub error_message: Option<String>,
    pub character_sheet_url: Option<String>,
    pub durations: PhaseDurations,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            input_preview: task.input_text.chars().take(INPUT_PREVIEW_CHARS).collect(),
            id: task.id,
            status: task.status,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
            attachment_count: task.attachment_count,
            attachment_urls: task.attachment_urls,
            is_valid: task.is_valid,
            reject_reason: task.reject_reason,
            messages: task.messages,
            error_message: task.error_message,
            character_sheet_url: task.character_sheet_url,
            durations: task.durations,
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListComicsResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ComicErrorResponse {
    pub error: String,
}

type ErrorReply = (StatusCode, Json<ComicErrorResponse>);

fn error_reply(status: StatusCode, error: impl Into<String>) -> ErrorReply {
    (
        status,
        Json(ComicErrorResponse {
            error: error.into(),
        }),
    )
}

fn orchestrator_error(err: OrchestratorError) -> ErrorReply {
    let status = match &err {
        OrchestratorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::TooManyAttachments { .. } => StatusCode::BAD_REQUEST,
        OrchestratorError::Validation { .. } => StatusCode::BAD_GATEWAY,
        OrchestratorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::TaskStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_reply(status, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a text for comic generation.
///
/// Answers once validation has decided; rendering continues in the background.
pub async fn submit_comic(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitComicBody>,
) -> axum::response::Response {
    let mut images = Vec::with_capacity(body.images.len());
    for (index, encoded) in body.images.iter().enumerate() {
        match ImageData::from_base64(encoded) {
            Ok(image) => images.push(image),
            Err(e) => {
                return error_reply(
                    StatusCode::BAD_REQUEST,
                    format!("image {} is invalid: {}", index, e),
                )
                .into_response()
            }
        }
    }
    if !body.image_urls.is_empty() {
        images.extend(state.image_fetcher().fetch_all(&body.image_urls).await);
    }

    let submission = Submission::new(body.text).with_images(images);
    match state.orchestrator().submit(submission).await {
        Ok(outcome) if outcome.is_rejected() => (
            StatusCode::BAD_REQUEST,
            Json(RejectedComicResponse {
                task_id: outcome.task_id,
                status: outcome.status,
                reject_reason: outcome.reject_reason,
            }),
        )
            .into_response(),
        Ok(outcome) => (
            StatusCode::ACCEPTED,
            Json(SubmitComicResponse {
                task_id: outcome.task_id,
                status: outcome.status,
                messages: outcome.messages,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Comic submission failed");
            orchestrator_error(e).into_response()
        }
    }
}

/// Get the status snapshot of a task
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ErrorReply> {
    state
        .orchestrator()
        .get_status(&id)
        .map(|task| Json(TaskResponse::from(task)))
        .map_err(orchestrator_error)
}

/// Get the generated comic of a task
pub async fn get_comic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ComicResult>, ErrorReply> {
    state
        .orchestrator()
        .get_result(&id)
        .map(Json)
        .map_err(orchestrator_error)
}

/// List tasks, newest first, with optional status filter
pub async fn list_comics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListComicsParams>,
) -> Result<Json<ListComicsResponse>, ErrorReply> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TaskFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        match status.parse::<TaskStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => return Err(error_reply(StatusCode::BAD_REQUEST, e)),
        }
    }

    let tasks = state
        .orchestrator()
        .list_tasks(&filter)
        .map_err(orchestrator_error)?;
    let total = state
        .orchestrator()
        .count_tasks(&filter)
        .map_err(orchestrator_error)?;

    Ok(Json(ListComicsResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}
