use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use super::prompts::{character_sheet_prompt, reference_prompt, styled_prompt};
use crate::analyzer::Episode;
use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::audit::AuditHandle;
use crate::imaging::{ImageData, ImageGenerator};
use crate::service::{invoke, ExternalCall, FailureKind, RetryPolicy, ServiceError};

#[derive(Debug, Error)]
pub enum FanOutError {
    #[error("nothing to render")]
    NoEpisodes,

    #[error("character sheet failed: {0}")]
    CharacterSheet(ServiceError),

    #[error("episode {index} failed: {source}")]
    Episode { index: u32, source: ServiceError },
}

impl FanOutError {
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            FanOutError::NoEpisodes => None,
            FanOutError::CharacterSheet(e) | FanOutError::Episode { source: e, .. } => Some(e),
        }
    }

    pub fn classify(&self) -> FailureKind {
        match self.service_error() {
            Some(e) => FailureKind::classify(e),
            None => FailureKind::internal("empty"),
        }
    }
}

/// Observer for intermediate rendering results.
#[async_trait]
pub trait RenderProgress: Send + Sync {
    /// The character sheet was stored and is about to be used as reference.
    async fn character_sheet_ready(&self, url: &str);
}

/// Result of rendering a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// `image_urls[i]` renders `episodes[i]`.
    pub image_urls: Vec<String>,
    /// Set only when the reference phase ran.
    pub character_sheet_url: Option<String>,
    pub sheet_secs: Option<f64>,
    pub episode_secs: f64,
}

/// Turns a scenario into an ordered list of stored images.
///
/// A single episode is drawn directly. Two or more episodes first get one
/// character sheet, which is then passed as reference to every episode call;
/// episode calls run concurrently and their results are put back in episode
/// order. Any failure aborts the whole render and discards finished siblings.
pub struct FanOutEngine {
    generator: Arc<dyn ImageGenerator>,
    sheet_generator: Option<Arc<dyn ImageGenerator>>,
    artifacts: Arc<dyn ArtifactStore>,
    retry: RetryPolicy,
    audit: Option<AuditHandle>,
    style_prefix: String,
}

impl FanOutEngine {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
        retry: RetryPolicy,
        style_prefix: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            sheet_generator: None,
            artifacts,
            retry,
            audit: None,
            style_prefix: style_prefix.into(),
        }
    }

    /// Use a different (usually faster) generator for the character sheet.
    pub fn with_sheet_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.sheet_generator = Some(generator);
        self
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn render(
        &self,
        task_id: &str,
        episodes: &[Episode],
        progress: Option<&dyn RenderProgress>,
    ) -> Result<RenderOutput, FanOutError> {
        match episodes {
            [] => Err(FanOutError::NoEpisodes),
            [single] => self.render_single(task_id, single).await,
            _ => self.render_with_sheet(task_id, episodes, progress).await,
        }
    }

    async fn render_single(
        &self,
        task_id: &str,
        episode: &Episode,
    ) -> Result<RenderOutput, FanOutError> {
        let started = Instant::now();
        let prompt = styled_prompt(&self.style_prefix, &episode.image_prompt);

        let url = async {
            let image = self.generate(task_id, self.generator.as_ref(), &prompt).await?;
            self.store(task_id, ArtifactKind::Panel, &image).await
        }
        .await
        .map_err(|source| FanOutError::Episode {
            index: episode.index,
            source,
        })?;

        Ok(RenderOutput {
            image_urls: vec![url],
            character_sheet_url: None,
            sheet_secs: None,
            episode_secs: started.elapsed().as_secs_f64(),
        })
    }

    async fn render_with_sheet(
        &self,
        task_id: &str,
        episodes: &[Episode],
        progress: Option<&dyn RenderProgress>,
    ) -> Result<RenderOutput, FanOutError> {
        let sheet_started = Instant::now();
        let sheet_generator = self.sheet_generator.as_ref().unwrap_or(&self.generator);
        let sheet_prompt = character_sheet_prompt(&self.style_prefix, episodes);

        let (sheet, sheet_url) = async {
            let sheet = self
                .generate(task_id, sheet_generator.as_ref(), &sheet_prompt)
                .await?;
            let url = self
                .store(task_id, ArtifactKind::CharacterSheet, &sheet)
                .await?;
            Ok::<_, ServiceError>((sheet, url))
        }
        .await
        .map_err(FanOutError::CharacterSheet)?;
        let sheet_secs = sheet_started.elapsed().as_secs_f64();

        info!(task_id, url = %sheet_url, "Character sheet ready");
        if let Some(progress) = progress {
            progress.character_sheet_ready(&sheet_url).await;
        }

        let episodes_started = Instant::now();
        let mut pending: FuturesUnordered<_> = episodes
            .iter()
            .map(|episode| {
                let sheet = &sheet;
                async move {
                    let prompt = reference_prompt(&episode.image_prompt);
                    let result = async {
                        let image = self.generate_with_reference(task_id, &prompt, sheet).await?;
                        self.store(task_id, ArtifactKind::Panel, &image).await
                    }
                    .await;
                    (episode.index, result)
                }
            })
            .collect();

        let mut rendered = Vec::with_capacity(episodes.len());
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(url) => {
                    debug!(task_id, index, "Episode rendered");
                    rendered.push((index, url));
                }
                // Dropping `pending` cancels the remaining siblings.
                Err(source) => return Err(FanOutError::Episode { index, source }),
            }
        }

        rendered.sort_by_key(|(index, _)| *index);

        Ok(RenderOutput {
            image_urls: rendered.into_iter().map(|(_, url)| url).collect(),
            character_sheet_url: Some(sheet_url),
            sheet_secs: Some(sheet_secs),
            episode_secs: episodes_started.elapsed().as_secs_f64(),
        })
    }

    async fn generate(
        &self,
        task_id: &str,
        generator: &dyn ImageGenerator,
        prompt: &str,
    ) -> Result<ImageData, ServiceError> {
        let call = ExternalCall::new("image", "generate", generator.model())
            .for_task(task_id)
            .with_request(json!({ "prompt": prompt }));

        invoke(&self.retry, self.audit.as_ref(), &call, summarize_image, move || {
            generator.generate(prompt)
        })
        .await
    }

    async fn generate_with_reference(
        &self,
        task_id: &str,
        prompt: &str,
        reference: &ImageData,
    ) -> Result<ImageData, ServiceError> {
        let generator = self.generator.as_ref();
        let call = ExternalCall::new("image", "generate_with_reference", generator.model())
            .for_task(task_id)
            .with_request(json!({
                "prompt": prompt,
                "reference": summarize_image(reference),
            }));

        invoke(&self.retry, self.audit.as_ref(), &call, summarize_image, move || {
            generator.generate_with_reference(prompt, reference)
        })
        .await
    }

    async fn store(
        &self,
        task_id: &str,
        kind: ArtifactKind,
        image: &ImageData,
    ) -> Result<String, ServiceError> {
        let artifacts = self.artifacts.as_ref();
        let call = ExternalCall::new("storage", "store", artifacts.backend())
            .for_task(task_id)
            .with_request(json!({ "kind": kind.as_str(), "image": summarize_image(image) }));

        invoke(
            &self.retry,
            self.audit.as_ref(),
            &call,
            |url: &String| json!({ "url": url }),
            move || artifacts.store(kind, image),
        )
        .await
    }
}

fn summarize_image(image: &ImageData) -> serde_json::Value {
    json!({ "mime_type": image.mime_type, "bytes": image.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::testing::{fixtures, MockArtifactStore, MockImageGenerator};

    #[derive(Default)]
    struct RecordingProgress {
        sheets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RenderProgress for RecordingProgress {
        async fn character_sheet_ready(&self, url: &str) {
            self.sheets.lock().unwrap().push(url.to_string());
        }
    }

    fn engine(generator: Arc<MockImageGenerator>, artifacts: Arc<MockArtifactStore>) -> FanOutEngine {
        FanOutEngine::new(generator, artifacts, RetryPolicy::default(), "flat colors")
    }

    #[tokio::test]
    async fn test_empty_scenario() {
        let engine = engine(
            Arc::new(MockImageGenerator::new()),
            Arc::new(MockArtifactStore::new()),
        );

        let err = engine.render("t-1", &[], None).await.unwrap_err();
        assert!(matches!(err, FanOutError::NoEpisodes));
    }

    #[tokio::test]
    async fn test_single_episode_uses_style_prefix() {
        let generator = Arc::new(MockImageGenerator::new());
        let engine = engine(Arc::clone(&generator), Arc::new(MockArtifactStore::new()));

        let output = engine
            .render("t-1", &fixtures::episodes(1), None)
            .await
            .unwrap();

        assert_eq!(output.image_urls.len(), 1);
        assert!(output.character_sheet_url.is_none());
        assert!(output.sheet_secs.is_none());
        let calls = generator.recorded_calls().await;
        assert!(calls[0].prompt.starts_with("flat colors\n\n"));
    }

    #[tokio::test]
    async fn test_sheet_generator_and_progress() {
        let generator = Arc::new(MockImageGenerator::with_model("detailed"));
        let sheet_generator = Arc::new(MockImageGenerator::with_model("fast"));
        let artifacts = Arc::new(MockArtifactStore::new());
        let engine = engine(Arc::clone(&generator), Arc::clone(&artifacts))
            .with_sheet_generator(sheet_generator.clone());
        let progress = RecordingProgress::default();

        let output = engine
            .render("t-1", &fixtures::episodes(3), Some(&progress))
            .await
            .unwrap();

        assert_eq!(sheet_generator.call_count().await, 1);
        assert_eq!(generator.call_count().await, 3);
        assert_eq!(output.image_urls.len(), 3);
        let sheet_url = output.character_sheet_url.unwrap();
        assert_eq!(*progress.sheets.lock().unwrap(), vec![sheet_url.clone()]);
        assert_eq!(
            artifacts.stored_of_kind(ArtifactKind::CharacterSheet).await[0].url,
            sheet_url
        );
    }

    #[tokio::test]
    async fn test_sheet_failure_skips_episodes() {
        let generator = Arc::new(MockImageGenerator::new());
        generator.fail_next(3, fixtures::overloaded()).await;
        let engine = engine(Arc::clone(&generator), Arc::new(MockArtifactStore::new()));

        let err = engine
            .render("t-1", &fixtures::episodes(2), None)
            .await
            .unwrap_err();

        assert!(matches!(err, FanOutError::CharacterSheet(_)));
        assert_eq!(err.classify(), FailureKind::ServiceOverloaded);
        assert_eq!(generator.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_episode_failure_names_the_episode() {
        let generator = Arc::new(MockImageGenerator::new());
        generator
            .fail_when_prompt_contains("Scene: EPISODE-2", 3, fixtures::rate_limited())
            .await;
        let engine = engine(Arc::clone(&generator), Arc::new(MockArtifactStore::new()));

        let err = engine
            .render("t-1", &fixtures::episodes(3), None)
            .await
            .unwrap_err();

        assert!(matches!(err, FanOutError::Episode { index: 2, .. }));
        assert_eq!(err.classify(), FailureKind::RateLimited);
    }

    #[tokio::test]
    async fn test_storage_failure_is_retried() {
        let artifacts = Arc::new(MockArtifactStore::new());
        artifacts
            .fail_next(2, ServiceError::Storage("disk full".to_string()))
            .await;
        let engine = engine(Arc::new(MockImageGenerator::new()), Arc::clone(&artifacts));

        let output = engine
            .render("t-1", &fixtures::episodes(1), None)
            .await
            .unwrap();

        assert_eq!(output.image_urls.len(), 1);
        assert_eq!(artifacts.stored().await.len(), 1);
    }
}
