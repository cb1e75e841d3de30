//! User-facing classification of collaborator failures.

use serde::{Deserialize, Serialize};

use super::ServiceError;

/// What a failure means for the person who submitted the input.
///
/// Classification looks at the provider's signature (HTTP status, provider
/// status strings, block reasons) rather than the variant alone, since the
/// same condition reaches us through different transports. Payloads that may
/// carry model output or user text (json, malformed, storage) are never
/// searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Remote capacity exhausted.
    ServiceOverloaded,
    /// Too many requests from us.
    RateLimited,
    /// The call ran past its deadline.
    Timeout,
    /// The provider's safety filter refused the input.
    ContentRejectedBySafety,
    /// Anything else, tagged with the error category for operators.
    Unknown { category: String },
}

const OVERLOADED_MARKERS: &[&str] = &["overloaded", "unavailable", "try again later"];
const RATE_LIMIT_MARKERS: &[&str] = &["resource_exhausted", "rate limit", "quota", "too many requests"];
const TIMEOUT_MARKERS: &[&str] = &["deadline_exceeded", "deadline exceeded", "timed out", "timeout"];
const SAFETY_MARKERS: &[&str] = &["safety", "blocked", "prohibited_content", "blocklist"];

fn mentions(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

impl FailureKind {
    /// Classify a collaborator failure.
    pub fn classify(err: &ServiceError) -> Self {
        match err {
            ServiceError::Timeout(_) => FailureKind::Timeout,
            ServiceError::Api { status, message } => {
                let message = message.to_lowercase();
                if matches!(status, 503 | 529) || mentions(&message, OVERLOADED_MARKERS) {
                    FailureKind::ServiceOverloaded
                } else if *status == 429 || mentions(&message, RATE_LIMIT_MARKERS) {
                    FailureKind::RateLimited
                } else if *status == 504 || mentions(&message, TIMEOUT_MARKERS) {
                    FailureKind::Timeout
                } else if mentions(&message, SAFETY_MARKERS) {
                    FailureKind::ContentRejectedBySafety
                } else {
                    FailureKind::unknown(err)
                }
            }
            // Block reasons reported by the provider instead of content.
            ServiceError::Empty(reason) if mentions(&reason.to_lowercase(), SAFETY_MARKERS) => {
                FailureKind::ContentRejectedBySafety
            }
            _ => FailureKind::unknown(err),
        }
    }

    fn unknown(err: &ServiceError) -> Self {
        FailureKind::Unknown {
            category: err.category().to_string(),
        }
    }

    /// Failure that did not come from a collaborator (storage, panics, shutdown).
    pub fn internal(category: impl Into<String>) -> Self {
        FailureKind::Unknown {
            category: category.into(),
        }
    }

    /// Short snake_case name, used for metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::ServiceOverloaded => "service_overloaded",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::ContentRejectedBySafety => "content_rejected_by_safety",
            FailureKind::Unknown { .. } => "unknown",
        }
    }

    /// Message shown to the user on a failed task.
    pub fn user_message(&self) -> String {
        match self {
            FailureKind::ServiceOverloaded => {
                "The image service is busy right now. Please try again shortly.".to_string()
            }
            FailureKind::RateLimited => {
                "Too many requests at the moment. Please wait a little and retry.".to_string()
            }
            FailureKind::Timeout => {
                "Generation took too long. Try shortening your input.".to_string()
            }
            FailureKind::ContentRejectedBySafety => {
                "The input was blocked by the content filter. Please change your input and try again."
                    .to_string()
            }
            FailureKind::Unknown { category } => format!(
                "Something went wrong while drawing your comic. Please retry. [{}]",
                category
            ),
        }
    }
}
