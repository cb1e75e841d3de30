use std::time::Duration;

use super::wire::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};
use crate::service::ServiceError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Thin client for the `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base,
            urlencoding::encode(model)
        )
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ServiceError> {
        if self.api_key.is_empty() {
            return Err(ServiceError::NotConfigured);
        }

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();

        if status != 200 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Json(e.to_string()))
    }
}

/// Map an error body to `ServiceError::Api`, keeping the provider status
/// string (e.g. `RESOURCE_EXHAUSTED`) in the message for classification.
fn api_error(status: u16, body: &str) -> ServiceError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{}: {}", code, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.to_string(),
    };
    ServiceError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FailureKind;

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new("key", Duration::from_secs(5))
            .with_api_base("http://localhost:9999/");
        assert_eq!(
            client.endpoint("gemini-3-flash-preview"),
            "http://localhost:9999/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn test_api_error_keeps_provider_status() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = api_error(429, body);
        assert_eq!(
            err.to_string(),
            "API error: 429 - RESOURCE_EXHAUSTED: Quota exceeded"
        );
        assert_eq!(FailureKind::classify(&err), FailureKind::RateLimited);

        let err = api_error(500, "upstream exploded");
        assert_eq!(err.to_string(), "API error: 500 - upstream exploded");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::new("", Duration::from_secs(1));
        let request = GenerateContentRequest::user(vec![]);
        let err = client.generate_content("m", &request).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured));
    }
}
