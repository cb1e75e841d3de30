//! Task and comic records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::Episode;

/// Lifecycle state of a task.
///
/// `pending -> processing -> {completed | failed}` plus the terminal branch
/// `pending -> rejected`. A task found in `processing` by a new process can only
/// move to `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Rejected
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Rejected)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status: {}", s))
    }
}

/// Timed phases of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scenario,
    CharacterSheet,
    Episodes,
    Total,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scenario => "scenario",
            Phase::CharacterSheet => "character_sheet",
            Phase::Episodes => "episodes",
            Phase::Total => "total",
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Phase::Scenario => "scenario_secs",
            Phase::CharacterSheet => "sheet_secs",
            Phase::Episodes => "episode_secs",
            Phase::Total => "total_secs",
        }
    }
}

/// Seconds spent per phase. Each value is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub scenario_secs: Option<f64>,
    pub sheet_secs: Option<f64>,
    pub episode_secs: Option<f64>,
    pub total_secs: Option<f64>,
}

impl PhaseDurations {
    pub fn get(&self, phase: Phase) -> Option<f64> {
        match phase {
            Phase::Scenario => self.scenario_secs,
            Phase::CharacterSheet => self.sheet_secs,
            Phase::Episodes => self.episode_secs,
            Phase::Total => self.total_secs,
        }
    }
}

/// One user submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub input_text: String,
    /// Number of images attached to the submission.
    pub attachment_count: usize,
    /// Where the attachments were copied, once the upload side task finishes.
    pub attachment_urls: Vec<String>,
    /// Validation outcome, `None` until validation has answered.
    pub is_valid: Option<bool>,
    pub reject_reason: Option<String>,
    pub messages: Vec<String>,
    /// User-facing failure description, only set on `failed`.
    pub error_message: Option<String>,
    pub character_sheet_url: Option<String>,
    pub durations: PhaseDurations,
}

/// Generation result of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comic {
    pub task_id: String,
    pub episodes: Vec<Episode>,
    /// `image_urls[i]` renders `episodes[i]`.
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}
