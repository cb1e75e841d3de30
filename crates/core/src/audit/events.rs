use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one external call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Task lifecycle
    TaskCreated {
        task_id: String,
        /// Length of the submitted text in characters
        text_chars: usize,
        attachment_count: usize,
    },
    TaskStateChanged {
        task_id: String,
        from_state: String,
        to_state: String,
        reason: Option<String>,
    },
    /// Attached images were copied to the artifact store.
    AttachmentsStored {
        task_id: String,
        urls: Vec<String>,
    },

    /// One attempt of one collaborator call.
    ExternalCall {
        task_id: Option<String>,
        /// "analyzer", "image" or "storage"
        service: String,
        method: String,
        model: String,
        /// 1-based attempt number within the retry budget
        attempt: u32,
        status: CallStatus,
        duration_secs: f64,
        request: Value,
        response: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskStateChanged { .. } => "task_state_changed",
            Self::AttachmentsStored { .. } => "attachments_stored",
            Self::ExternalCall { .. } => "external_call",
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskStateChanged { task_id, .. }
            | Self::AttachmentsStored { task_id, .. } => Some(task_id),
            Self::ExternalCall { task_id, .. } => task_id.as_deref(),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub task_id: Option<String>,
    pub data: AuditEvent,
}
