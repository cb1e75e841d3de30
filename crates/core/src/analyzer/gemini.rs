use std::time::Duration;

use async_trait::async_trait;

use super::prompts::{
    scenario_prompt, scenario_schema, validation_prompt, validation_schema, SCENARIO_SYSTEM,
    VALIDATION_SYSTEM,
};
use super::{
    normalize_episodes, precheck, ContentAnalyzer, Episode, ValidationResult, MAX_INPUT_CHARS,
};
use crate::gemini::{GeminiClient, GenerateContentRequest, GenerationConfig, Part};
use crate::imaging::ImageData;
use crate::service::ServiceError;

const DEFAULT_REJECT_REASON: &str = "This input cannot be turned into a comic.";

/// Content analyzer backed by a Gemini text model.
pub struct GeminiAnalyzer {
    client: GeminiClient,
    model: String,
    temperature: f32,
    max_input_chars: usize,
}

impl GeminiAnalyzer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: GeminiClient::new(api_key, timeout),
            model: model.into(),
            temperature: 0.7,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.client = self.client.with_api_base(api_base);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Longer text is rejected by `validate` without a remote call.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    fn build_request(
        &self,
        system: &str,
        prompt: String,
        images: &[ImageData],
        schema: serde_json::Value,
        temperature: f32,
    ) -> GenerateContentRequest {
        let mut parts: Vec<Part> = images.iter().map(Part::image).collect();
        parts.push(Part::text(prompt));

        GenerateContentRequest::user(parts)
            .with_system(system)
            .with_config(GenerationConfig::json(schema, temperature))
    }
}

/// Parse the model's JSON answer. The body stays out of the error: it is
/// model output and may quote the user's input.
fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::debug!(body_chars = text.chars().count(), "Unparsable model response: {}", e);
        ServiceError::Json(e.to_string())
    })
}

fn parse_validation(text: &str) -> Result<ValidationResult, ServiceError> {
    let mut result: ValidationResult = parse_json(text)?;

    if result.is_valid {
        result.reject_reason = None;
    } else if result
        .reject_reason
        .as_deref()
        .map_or(true, |r| r.trim().is_empty())
    {
        result.reject_reason = Some(DEFAULT_REJECT_REASON.to_string());
    }

    Ok(result)
}

fn parse_scenario(text: &str) -> Result<Vec<Episode>, ServiceError> {
    let episodes: Vec<Episode> = parse_json(text)?;
    normalize_episodes(episodes)
}

#[async_trait]
impl ContentAnalyzer for GeminiAnalyzer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn validate(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<ValidationResult, ServiceError> {
        if let Some(rejection) = precheck(text, images, self.max_input_chars) {
            return Ok(rejection);
        }

        // Screening should be deterministic.
        let request = self.build_request(
            VALIDATION_SYSTEM,
            validation_prompt(text, images.len()),
            images,
            validation_schema(),
            0.0,
        );
        let response = self.client.generate_content(&self.model, &request).await?;
        parse_validation(&response.text()?)
    }

    async fn generate_scenario(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<Vec<Episode>, ServiceError> {
        let request = self.build_request(
            SCENARIO_SYSTEM,
            scenario_prompt(text, images.len()),
            images,
            scenario_schema(),
            self.temperature,
        );
        let response = self.client.generate_content(&self.model, &request).await?;
        let episodes = parse_scenario(&response.text()?)?;
        tracing::debug!(model = %self.model, episodes = episodes.len(), "Scenario generated");
        Ok(episodes)
    }
}
