use std::time::Duration;

use async_trait::async_trait;

use super::{ImageData, ImageGenerator};
use crate::gemini::{GeminiClient, GenerateContentRequest, GenerationConfig, Part};
use crate::service::ServiceError;

/// Image generator backed by a Gemini image model.
pub struct GeminiImageGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiImageGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: GeminiClient::new(api_key, timeout),
            model: model.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.client = self.client.with_api_base(api_base);
        self
    }

    async fn request(&self, parts: Vec<Part>) -> Result<ImageData, ServiceError> {
        let request = GenerateContentRequest::user(parts).with_config(GenerationConfig::image());
        let response = self.client.generate_content(&self.model, &request).await?;
        let image = response.first_image()?;
        tracing::debug!(model = %self.model, bytes = image.len(), "Image generated");
        Ok(image)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<ImageData, ServiceError> {
        self.request(vec![Part::text(prompt)]).await
    }

    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<ImageData, ServiceError> {
        // Reference first so the instruction can refer to "the image above".
        self.request(vec![Part::image(reference), Part::text(prompt)])
            .await
    }
}
