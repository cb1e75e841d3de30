//! Error type for external collaborators.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the content analyzer, image generator and artifact store.
///
/// The variants describe where a failure came from, not what it means for the
/// user. Use [`super::FailureKind::classify`] for the latter.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(String),

    /// The service answered but produced nothing usable.
    #[error("Empty response: {0}")]
    Empty(String),

    /// The service answered with data that violates its contract.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not configured")]
    NotConfigured,
}

impl ServiceError {
    /// Short category name, used to tag otherwise unclassified failures.
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::Http(_) => "http",
            ServiceError::Api { .. } => "api",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::Json(_) => "json",
            ServiceError::Empty(_) => "empty",
            ServiceError::Malformed(_) => "malformed",
            ServiceError::Storage(_) => "storage",
            ServiceError::NotConfigured => "not_configured",
        }
    }

    /// Convert a transport error, keeping timeouts distinguishable.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(timeout)
        } else {
            ServiceError::Http(err.to_string())
        }
    }
}
