//! Mock content analyzer for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fixtures;
use crate::analyzer::{ContentAnalyzer, Episode, ValidationResult};
use crate::imaging::ImageData;
use crate::service::ServiceError;

/// A recorded analyzer call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAnalysis {
    /// "validate" or "generate_scenario"
    pub method: &'static str,
    pub text: String,
    pub image_count: usize,
    pub started_at: Instant,
}

/// Mock implementation of [`ContentAnalyzer`].
///
/// Accepts everything and returns a two-episode scenario unless configured
/// otherwise. Failures are scripted per method: each queued error fails one
/// call, after which calls succeed again.
pub struct MockAnalyzer {
    validation: Arc<RwLock<ValidationResult>>,
    scenario: Arc<RwLock<Vec<Episode>>>,
    validation_errors: Arc<RwLock<VecDeque<ServiceError>>>,
    scenario_errors: Arc<RwLock<VecDeque<ServiceError>>>,
    validation_delay: Arc<RwLock<Duration>>,
    scenario_delay: Arc<RwLock<Duration>>,
    calls: Arc<RwLock<Vec<RecordedAnalysis>>>,
    scenarios_finished: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAnalyzer").finish_non_exhaustive()
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            validation: Arc::new(RwLock::new(ValidationResult::accept(vec![
                "Drawing your comic!".to_string(),
            ]))),
            scenario: Arc::new(RwLock::new(fixtures::episodes(2))),
            validation_errors: Arc::new(RwLock::new(VecDeque::new())),
            scenario_errors: Arc::new(RwLock::new(VecDeque::new())),
            validation_delay: Arc::new(RwLock::new(Duration::ZERO)),
            scenario_delay: Arc::new(RwLock::new(Duration::ZERO)),
            calls: Arc::new(RwLock::new(Vec::new())),
            scenarios_finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set_validation(&self, result: ValidationResult) {
        *self.validation.write().await = result;
    }

    pub async fn set_scenario(&self, episodes: Vec<Episode>) {
        *self.scenario.write().await = episodes;
    }

    /// Fail the next `times` validate calls with `error`.
    pub async fn fail_validation(&self, times: usize, error: ServiceError) {
        let mut errors = self.validation_errors.write().await;
        errors.extend(std::iter::repeat(error).take(times));
    }

    /// Fail the next `times` scenario calls with `error`.
    pub async fn fail_scenario(&self, times: usize, error: ServiceError) {
        let mut errors = self.scenario_errors.write().await;
        errors.extend(std::iter::repeat(error).take(times));
    }

    pub async fn set_validation_delay(&self, delay: Duration) {
        *self.validation_delay.write().await = delay;
    }

    pub async fn set_scenario_delay(&self, delay: Duration) {
        *self.scenario_delay.write().await = delay;
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedAnalysis> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self, method: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Scenario calls that ran to completion (were not abandoned).
    pub fn scenarios_finished(&self) -> usize {
        self.scenarios_finished.load(Ordering::SeqCst)
    }

    async fn record(&self, method: &'static str, text: &str, images: &[ImageData]) {
        self.calls.write().await.push(RecordedAnalysis {
            method,
            text: text.to_string(),
            image_count: images.len(),
            started_at: Instant::now(),
        });
    }
}

#[async_trait]
impl ContentAnalyzer for MockAnalyzer {
    fn model(&self) -> &str {
        "mock-analyzer"
    }

    async fn validate(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<ValidationResult, ServiceError> {
        self.record("validate", text, images).await;

        let delay = *self.validation_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.validation_errors.write().await.pop_front() {
            return Err(error);
        }
        Ok(self.validation.read().await.clone())
    }

    async fn generate_scenario(
        &self,
        text: &str,
        images: &[ImageData],
    ) -> Result<Vec<Episode>, ServiceError> {
        self.record("generate_scenario", text, images).await;

        let delay = *self.scenario_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match self.scenario_errors.write().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(self.scenario.read().await.clone()),
        };
        self.scenarios_finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}
