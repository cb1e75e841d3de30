use async_trait::async_trait;

use super::ImageData;
use crate::service::ServiceError;

/// Image generation backend.
///
/// Each method is a single attempt; retries and auditing are applied by the
/// caller through [`crate::service::invoke`].
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Model identifier, recorded in audit events.
    fn model(&self) -> &str;

    /// Generate an image from a text prompt.
    async fn generate(&self, prompt: &str) -> Result<ImageData, ServiceError>;

    /// Generate an image that follows the look of `reference`.
    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<ImageData, ServiceError>;
}
