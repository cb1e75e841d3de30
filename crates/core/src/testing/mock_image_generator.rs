//! Mock image generator for testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::imaging::{ImageData, ImageGenerator};
use crate::service::ServiceError;

/// A recorded generation call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedImageCall {
    /// "generate" or "generate_with_reference"
    pub method: &'static str,
    pub prompt: String,
    pub reference: Option<ImageData>,
    pub started_at: Instant,
    /// `None` while in flight, or if the call was abandoned.
    pub finished_at: Option<Instant>,
}

type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// A scripted failure: calls whose prompt contains `pattern` fail
/// `remaining` more times.
struct FailureRule {
    pattern: String,
    remaining: usize,
    error: ServiceError,
}

/// Mock implementation of [`ImageGenerator`].
///
/// Every image's bytes are `"image:<prompt>"`, so tests can trace a stored
/// artifact back to the prompt that produced it.
pub struct MockImageGenerator {
    model: String,
    calls: Arc<RwLock<Vec<RecordedImageCall>>>,
    failures: Arc<RwLock<Vec<FailureRule>>>,
    next_errors: Arc<RwLock<VecDeque<ServiceError>>>,
    delay: Arc<RwLock<Option<DelayFn>>>,
}

impl std::fmt::Debug for MockImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockImageGenerator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::with_model("mock-image")
    }

    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(Vec::new())),
            next_errors: Arc::new(RwLock::new(VecDeque::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Decode the prompt back out of an image produced by this mock.
    pub fn prompt_of(image: &ImageData) -> Option<String> {
        String::from_utf8(image.bytes.clone())
            .ok()
            .and_then(|s| s.strip_prefix("image:").map(String::from))
    }

    /// Fail the next `times` calls, whatever their prompt.
    pub async fn fail_next(&self, times: usize, error: ServiceError) {
        let mut errors = self.next_errors.write().await;
        errors.extend(std::iter::repeat(error).take(times));
    }

    /// Fail the next `times` calls whose prompt contains `pattern`.
    pub async fn fail_when_prompt_contains(
        &self,
        pattern: impl Into<String>,
        times: usize,
        error: ServiceError,
    ) {
        self.failures.write().await.push(FailureRule {
            pattern: pattern.into(),
            remaining: times,
            error,
        });
    }

    /// Delay each call by an amount derived from its prompt.
    pub async fn set_delay_fn(&self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) {
        *self.delay.write().await = Some(Box::new(delay));
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedImageCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn scripted_error(&self, prompt: &str) -> Option<ServiceError> {
        if let Some(error) = self.next_errors.write().await.pop_front() {
            return Some(error);
        }
        let mut failures = self.failures.write().await;
        let rule = failures
            .iter_mut()
            .find(|r| r.remaining > 0 && prompt.contains(&r.pattern))?;
        rule.remaining -= 1;
        Some(rule.error.clone())
    }

    async fn run(
        &self,
        method: &'static str,
        prompt: &str,
        reference: Option<&ImageData>,
    ) -> Result<ImageData, ServiceError> {
        let slot = {
            let mut calls = self.calls.write().await;
            calls.push(RecordedImageCall {
                method,
                prompt: prompt.to_string(),
                reference: reference.cloned(),
                started_at: Instant::now(),
                finished_at: None,
            });
            calls.len() - 1
        };

        let delay = self.delay.read().await.as_ref().map(|f| f(prompt));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.scripted_error(prompt).await {
            Some(error) => Err(error),
            None => Ok(ImageData::png(format!("image:{}", prompt).into_bytes())),
        };

        self.calls.write().await[slot].finished_at = Some(Instant::now());
        result
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<ImageData, ServiceError> {
        self.run("generate", prompt, None).await
    }

    async fn generate_with_reference(
        &self,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<ImageData, ServiceError> {
        self.run("generate_with_reference", prompt, Some(reference))
            .await
    }
}
