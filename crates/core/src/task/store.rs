//! Task storage trait and types.

use thiserror::Error;

use super::{Comic, Phase, Task, TaskStatus};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The task was not in the state the caller expected, or the edge is not
    /// part of the state machine.
    #[error("Cannot move task {task_id} from {from} to {to}: current status is {current}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
        current: TaskStatus,
    },

    /// A set-once field was written twice.
    #[error("Task {task_id}: {field} is already set")]
    AlreadySet { task_id: String, field: &'static str },

    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub input_text: String,
    pub attachment_count: usize,
}

/// Filter for listing tasks, newest first.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self {
            statuses: Vec::new(),
            limit: 100,
            offset: 0,
        }
    }

    /// Restrict to a status. Calling it repeatedly widens the set.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for task storage backends.
///
/// Every mutation touches only the columns it names, so the attachment
/// upload side task can write concurrently with the status flow.
pub trait TaskStore: Send + Sync {
    /// Create a task in `pending`.
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError>;

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError>;

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError>;

    /// Compare-and-set status change. Fails with `InvalidTransition` if the
    /// task is not currently `from` or `from -> to` is not allowed.
    fn transition(&self, id: &str, from: TaskStatus, to: TaskStatus) -> Result<Task, TaskError>;

    /// `from -> failed` with the user-facing error message.
    fn mark_failed(&self, id: &str, from: TaskStatus, message: &str) -> Result<Task, TaskError>;

    /// Record the validation outcome. Set once.
    fn record_validation(
        &self,
        id: &str,
        is_valid: bool,
        reject_reason: Option<&str>,
        messages: &[String],
    ) -> Result<(), TaskError>;

    /// Record a phase duration. A phase already recorded keeps its first value.
    fn record_duration(&self, id: &str, phase: Phase, secs: f64) -> Result<(), TaskError>;

    fn set_character_sheet_url(&self, id: &str, url: &str) -> Result<(), TaskError>;

    fn set_attachment_urls(&self, id: &str, urls: &[String]) -> Result<(), TaskError>;

    /// Store the comic and move `processing -> completed` atomically.
    fn complete(&self, comic: &Comic) -> Result<Task, TaskError>;

    fn get_comic(&self, task_id: &str) -> Result<Option<Comic>, TaskError>;

    /// Fail every task that was left `processing`, or accepted but still
    /// `pending`. Returns each affected id with the status it had.
    fn fail_unfinished(&self, message: &str) -> Result<Vec<(String, TaskStatus)>, TaskError>;

    /// Delete a task and its comic.
    fn delete(&self, id: &str) -> Result<Task, TaskError>;
}
