use async_trait::async_trait;

use super::{Episode, ValidationResult};
use crate::imaging::ImageData;
use crate::service::ServiceError;

/// Text analysis backend.
///
/// Both calls may be slow and may be abandoned mid-flight by the caller;
/// implementations must not rely on running to completion.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Model identifier, recorded in audit events.
    fn model(&self) -> &str;

    /// Decide whether the input can be turned into a comic.
    async fn validate(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<ValidationResult, ServiceError>;

    /// Produce the scenario. An empty list is an error, never a valid result.
    async fn generate_scenario(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<Vec<Episode>, ServiceError>;
}
