//! Types for the comic orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::Episode;
use crate::imaging::ImageData;
use crate::service::ServiceError;
use crate::task::{TaskError, TaskStatus};

/// Errors returned to the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("too many attachments: {count} (at most {max})")]
    TooManyAttachments { count: usize, max: usize },

    /// The analyzer itself failed while validating; the task stays `pending`.
    #[error("validation of task {task_id} failed: {source}")]
    Validation {
        task_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("task store error: {0}")]
    TaskStore(#[from] TaskError),

    #[error("orchestrator is shutting down")]
    ShuttingDown,
}

/// Input of one submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub text: String,
    pub images: Vec<ImageData>,
}

impl Submission {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageData>) -> Self {
        self.images = images;
        self
    }
}

/// What `submit` reports once validation has decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub task_id: String,
    /// `pending` when accepted, `rejected` otherwise.
    pub status: TaskStatus,
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

impl SubmitOutcome {
    pub fn is_rejected(&self) -> bool {
        self.status == TaskStatus::Rejected
    }
}

/// Result view of a task. Episodes and images are empty until `completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub episodes: Vec<Episode>,
    pub image_urls: Vec<String>,
    pub character_sheet_url: Option<String>,
    pub error_message: Option<String>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// False once shutdown has started.
    pub accepting: bool,
    /// Render continuations currently running.
    pub active_continuations: usize,
    /// Attachment uploads currently running.
    pub active_uploads: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_outcome_serialization() {
        let outcome = SubmitOutcome {
            task_id: "t-1".to_string(),
            status: TaskStatus::Pending,
            messages: vec!["On it!".to_string()],
            reject_reason: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("reject_reason").is_none());
        assert!(!outcome.is_rejected());
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::TooManyAttachments { count: 4, max: 3 };
        assert_eq!(err.to_string(), "too many attachments: 4 (at most 3)");
    }
}
