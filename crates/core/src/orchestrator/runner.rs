//! Comic orchestrator implementation.
//!
//! A submission is driven through two concurrent remote calls:
//! - Validation: awaited on the request path, decides accept or reject
//! - Scenario generation: started immediately, consumed by the background
//!   continuation once validation has accepted the input
//!
//! The continuation then renders the scenario and persists the comic. Each
//! task's continuation owns a cancellation token; rejecting the input or
//! shutting down cancels it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analyzer::{normalize_episodes, precheck, ContentAnalyzer, Episode, ValidationResult};
use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::audit::{AuditEvent, AuditHandle};
use crate::fanout::{FanOutEngine, RenderProgress};
use crate::imaging::{ImageData, ImageGenerator};
use crate::metrics::{
    FAILURES, PANELS_PER_COMIC, PHASE_DURATION, SUBMISSIONS, TASKS_FINISHED, TASKS_IN_FLIGHT,
};
use crate::notify::{Notification, NotificationSink};
use crate::service::{invoke, ExternalCall, FailureKind, ServiceError};
use crate::task::{Comic, CreateTaskRequest, Phase, Task, TaskFilter, TaskStatus, TaskStore};

use super::config::OrchestratorConfig;
use super::registry::{JobKind, TaskRegistry};
use super::types::{
    ComicResult, OrchestratorError, OrchestratorStatus, SubmitOutcome, Submission,
};

const PREVIEW_CHARS: usize = 200;
const INTERRUPTED_MESSAGE: &str = "Processing was interrupted by a server restart. Please submit again.";

/// Episodes and elapsed seconds, or `None` if the call was cancelled.
type ScenarioOutcome = Option<Result<(Vec<Episode>, f64), ServiceError>>;

/// External collaborators of the orchestrator.
pub struct Collaborators {
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub generator: Arc<dyn ImageGenerator>,
    /// Generator for the character sheet; `generator` when unset.
    pub sheet_generator: Option<Arc<dyn ImageGenerator>>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Persists the character sheet URL as soon as the fan-out produces it.
struct TaskProgressUpdater {
    task_id: String,
    store: Arc<dyn TaskStore>,
}

#[async_trait]
impl RenderProgress for TaskProgressUpdater {
    async fn character_sheet_ready(&self, url: &str) {
        if let Err(e) = self.store.set_character_sheet_url(&self.task_id, url) {
            warn!(
                "Failed to record character sheet for task {}: {}",
                self.task_id, e
            );
        }
    }
}

/// State shared between the request path and detached jobs.
struct Inner {
    config: OrchestratorConfig,
    store: Arc<dyn TaskStore>,
    analyzer: Arc<dyn ContentAnalyzer>,
    artifacts: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn NotificationSink>,
    engine: FanOutEngine,
    audit: Option<AuditHandle>,
}

/// The comic orchestrator - turns a submission into a stored comic.
pub struct ComicOrchestrator {
    inner: Arc<Inner>,
    registry: Arc<TaskRegistry>,
}

impl ComicOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn TaskStore>,
        collaborators: Collaborators,
        audit: Option<AuditHandle>,
    ) -> Self {
        let mut engine = FanOutEngine::new(
            Arc::clone(&collaborators.generator),
            Arc::clone(&collaborators.artifacts),
            config.retry.clone(),
            config.style_prefix.clone(),
        );
        if let Some(sheet_generator) = collaborators.sheet_generator {
            engine = engine.with_sheet_generator(sheet_generator);
        }
        if let Some(ref audit) = audit {
            engine = engine.with_audit(audit.clone());
        }

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                analyzer: collaborators.analyzer,
                artifacts: collaborators.artifacts,
                notifier: collaborators.notifier,
                engine,
                audit,
            }),
            registry: Arc::new(TaskRegistry::new()),
        }
    }

    /// Submit input for conversion.
    ///
    /// Returns once validation has decided. An accepted task is returned as
    /// `pending`; its continuation keeps running in the background.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, OrchestratorError> {
        let started = Instant::now();
        let inner = &self.inner;

        let max = inner.config.max_attachments;
        if submission.images.len() > max {
            return Err(OrchestratorError::TooManyAttachments {
                count: submission.images.len(),
                max,
            });
        }
        if self.registry.is_closed() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let task = inner.store.create(CreateTaskRequest {
            input_text: submission.text.clone(),
            attachment_count: submission.images.len(),
        })?;
        let text_chars = submission.text.chars().count();
        info!(
            task_id = %task.id,
            text_chars,
            attachments = task.attachment_count,
            "Task created"
        );
        inner.emit(AuditEvent::TaskCreated {
            task_id: task.id.clone(),
            text_chars,
            attachment_count: task.attachment_count,
        });
        inner.notifier.notify(Notification::TaskCreated {
            task_id: task.id.clone(),
            text: submission.text.clone(),
            attachment_count: task.attachment_count,
        });

        let text: Arc<str> = Arc::from(submission.text);
        let images = Arc::new(submission.images);

        if !images.is_empty() {
            self.spawn_upload(&task.id, Arc::clone(&images));
        }

        if let Some(rejection) = precheck(&text, &images, inner.config.max_input_chars) {
            debug!(task_id = %task.id, "Input rejected before analysis");
            return self.reject(&task, rejection);
        }

        // Both calls are in flight before either is awaited.
        let token = self.registry.token();
        let scenario = self.spawn_scenario(
            &task.id,
            Arc::clone(&text),
            Arc::clone(&images),
            token.clone(),
        );

        let validation = match self.validate(&task.id, &text, &images).await {
            Ok(validation) => validation,
            Err(source) => {
                token.cancel();
                SUBMISSIONS.with_label_values(&["validation_error"]).inc();
                error!("Validation of task {} failed: {}", task.id, source);
                return Err(OrchestratorError::Validation {
                    task_id: task.id,
                    source,
                });
            }
        };

        if !validation.is_valid {
            token.cancel();
            return self.reject(&task, validation);
        }

        if let Err(e) = inner
            .store
            .record_validation(&task.id, true, None, &validation.messages)
        {
            token.cancel();
            return Err(e.into());
        }

        let continuation = run_continuation(
            Arc::clone(inner),
            task.id.clone(),
            text,
            token.clone(),
            scenario,
            started,
        );
        if !self
            .registry
            .spawn(&task.id, JobKind::Continuation, continuation)
        {
            token.cancel();
            inner.finish_interrupted(&task.id, TaskStatus::Pending);
            return Err(OrchestratorError::ShuttingDown);
        }

        SUBMISSIONS.with_label_values(&["accepted"]).inc();
        info!(task_id = %task.id, "Task accepted");

        Ok(SubmitOutcome {
            task_id: task.id,
            status: TaskStatus::Pending,
            messages: validation.messages,
            reject_reason: None,
        })
    }

    /// Current snapshot of a task.
    pub fn get_status(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.inner
            .store
            .get(task_id)?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    /// Episodes and image URLs of a task; both empty until it completes.
    pub fn get_result(&self, task_id: &str) -> Result<ComicResult, OrchestratorError> {
        let task = self.get_status(task_id)?;

        let comic = if task.status == TaskStatus::Completed {
            self.inner.store.get_comic(task_id)?
        } else {
            None
        };
        let (episodes, image_urls) = comic
            .map(|comic| (comic.episodes, comic.image_urls))
            .unwrap_or_default();

        Ok(ComicResult {
            task_id: task.id,
            status: task.status,
            episodes,
            image_urls,
            character_sheet_url: task.character_sheet_url,
            error_message: task.error_message,
        })
    }

    /// Tasks matching `filter`, newest first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, OrchestratorError> {
        Ok(self.inner.store.list(filter)?)
    }

    pub fn count_tasks(&self, filter: &TaskFilter) -> Result<i64, OrchestratorError> {
        Ok(self.inner.store.count(filter)?)
    }

    /// Fail tasks a previous process left unfinished: `processing`, or
    /// accepted and still `pending`.
    ///
    /// Call once at startup, before accepting submissions.
    pub fn recover_interrupted(&self) -> Result<Vec<String>, OrchestratorError> {
        let stranded = self.inner.store.fail_unfinished(INTERRUPTED_MESSAGE)?;
        let mut ids = Vec::with_capacity(stranded.len());
        for (id, from) in stranded {
            warn!(task_id = %id, from = %from, "Task was interrupted by a restart, marked failed");
            if from == TaskStatus::Pending {
                self.inner
                    .record_transition(&id, TaskStatus::Pending, TaskStatus::Processing, None);
            }
            self.inner.record_transition(
                &id,
                TaskStatus::Processing,
                TaskStatus::Failed,
                Some("interrupted".to_string()),
            );
            ids.push(id);
        }
        if !ids.is_empty() {
            TASKS_FINISHED
                .with_label_values(&["failed"])
                .inc_by(ids.len() as u64);
        }
        Ok(ids)
    }

    /// Whether a continuation is running for the task.
    pub fn is_running(&self, task_id: &str) -> bool {
        self.registry.is_running(task_id, JobKind::Continuation)
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            accepting: !self.registry.is_closed(),
            active_continuations: self.registry.active(JobKind::Continuation),
            active_uploads: self.registry.active(JobKind::Upload),
        }
    }

    /// Stop accepting submissions, cancel every continuation and wait for
    /// them to record their outcome.
    pub async fn shutdown(&self) {
        info!("Shutting down comic orchestrator");
        let timeout = Duration::from_secs(self.inner.config.shutdown_timeout_secs);
        if self.registry.shutdown(timeout).await {
            info!("Comic orchestrator stopped");
        } else {
            warn!("Comic orchestrator stopped with jobs still running");
        }
    }

    fn reject(
        &self,
        task: &Task,
        result: ValidationResult,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        let inner = &self.inner;
        let reason = result
            .reject_reason
            .unwrap_or_else(|| "The input could not be turned into a comic.".to_string());

        inner
            .store
            .record_validation(&task.id, false, Some(&reason), &result.messages)?;
        inner
            .store
            .transition(&task.id, TaskStatus::Pending, TaskStatus::Rejected)?;
        inner.record_transition(
            &task.id,
            TaskStatus::Pending,
            TaskStatus::Rejected,
            Some(reason.clone()),
        );

        SUBMISSIONS.with_label_values(&["rejected"]).inc();
        info!(task_id = %task.id, reason = %reason, "Task rejected");
        inner.notifier.notify(Notification::TaskRejected {
            task_id: task.id.clone(),
            reason: reason.clone(),
        });

        Ok(SubmitOutcome {
            task_id: task.id.clone(),
            status: TaskStatus::Rejected,
            messages: result.messages,
            reject_reason: Some(reason),
        })
    }

    async fn validate(
        &self,
        task_id: &str,
        text: &str,
        images: &[ImageData],
    ) -> Result<ValidationResult, ServiceError> {
        let inner = &self.inner;
        let analyzer = inner.analyzer.as_ref();
        let call = ExternalCall::new("analyzer", "validate", analyzer.model())
            .for_task(task_id)
            .with_request(input_summary(text, images));

        invoke(
            &inner.config.retry,
            inner.audit.as_ref(),
            &call,
            |result: &ValidationResult| {
                json!({ "is_valid": result.is_valid, "reject_reason": result.reject_reason })
            },
            move || analyzer.validate(text, images),
        )
        .await
    }

    /// Start scenario generation as its own task so it runs while validation
    /// is awaited. Cancelling `token` abandons the call.
    fn spawn_scenario(
        &self,
        task_id: &str,
        text: Arc<str>,
        images: Arc<Vec<ImageData>>,
        token: CancellationToken,
    ) -> JoinHandle<ScenarioOutcome> {
        let inner = Arc::clone(&self.inner);
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            let started = Instant::now();
            let analyzer = inner.analyzer.as_ref();
            let text: &str = &text;
            let images: &[ImageData] = &images;
            let call = ExternalCall::new("analyzer", "generate_scenario", analyzer.model())
                .for_task(&task_id)
                .with_request(input_summary(text, images));

            let work = invoke(
                &inner.config.retry,
                inner.audit.as_ref(),
                &call,
                |episodes: &Vec<Episode>| json!({ "episodes": episodes.len() }),
                move || analyzer.generate_scenario(text, images),
            );

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task_id = %task_id, "Scenario generation abandoned");
                    None
                }
                result = work => {
                    Some(result.map(|episodes| (episodes, started.elapsed().as_secs_f64())))
                }
            }
        })
    }

    fn spawn_upload(&self, task_id: &str, images: Arc<Vec<ImageData>>) {
        let inner = Arc::clone(&self.inner);
        let token = self.registry.token();
        let id = task_id.to_string();

        let spawned = self.registry.spawn(task_id, JobKind::Upload, async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task_id = %id, "Attachment upload cancelled");
                }
                _ = inner.upload_attachments(&id, &images) => {}
            }
        });
        if !spawned {
            warn!(task_id, "Attachment upload not started");
        }
    }
}

impl Inner {
    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    fn record_transition(
        &self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
        reason: Option<String>,
    ) {
        debug!(task_id, from = %from, to = %to, "Task status changed");
        self.emit(AuditEvent::TaskStateChanged {
            task_id: task_id.to_string(),
            from_state: from.as_str().to_string(),
            to_state: to.as_str().to_string(),
            reason,
        });
    }

    fn record_duration(&self, task_id: &str, phase: Phase, secs: f64) {
        PHASE_DURATION
            .with_label_values(&[phase.as_str()])
            .observe(secs);
        if let Err(e) = self.store.record_duration(task_id, phase, secs) {
            warn!(
                "Failed to record {} duration for task {}: {}",
                phase.as_str(),
                task_id,
                e
            );
        }
    }

    /// Scenario -> normalized episodes -> rendered images.
    async fn produce(
        &self,
        task_id: &str,
        scenario: JoinHandle<ScenarioOutcome>,
    ) -> Result<Comic, FailureKind> {
        let (episodes, scenario_secs) = match scenario.await {
            Ok(Some(Ok(scenario))) => scenario,
            Ok(Some(Err(e))) => {
                warn!("Scenario generation for task {} failed: {}", task_id, e);
                return Err(FailureKind::classify(&e));
            }
            Ok(None) => return Err(FailureKind::internal("interrupted")),
            Err(e) => {
                error!("Scenario task for {} ended abnormally: {}", task_id, e);
                return Err(FailureKind::internal("internal"));
            }
        };
        self.record_duration(task_id, Phase::Scenario, scenario_secs);

        let episodes = normalize_episodes(episodes).map_err(|e| {
            warn!("Scenario for task {} is unusable: {}", task_id, e);
            FailureKind::classify(&e)
        })?;
        info!(task_id, episodes = episodes.len(), "Scenario ready");

        let progress = TaskProgressUpdater {
            task_id: task_id.to_string(),
            store: Arc::clone(&self.store),
        };
        let output = self
            .engine
            .render(task_id, &episodes, Some(&progress))
            .await
            .map_err(|e| {
                warn!("Rendering task {} failed: {}", task_id, e);
                e.classify()
            })?;

        if let Some(secs) = output.sheet_secs {
            self.record_duration(task_id, Phase::CharacterSheet, secs);
        }
        self.record_duration(task_id, Phase::Episodes, output.episode_secs);

        Ok(Comic {
            task_id: task_id.to_string(),
            episodes,
            image_urls: output.image_urls,
            created_at: Utc::now(),
        })
    }

    fn finish_completed(&self, task_id: &str, text: &str, comic: Comic, started: Instant) {
        if let Err(e) = self.store.complete(&comic) {
            error!("Failed to store comic for task {}: {}", task_id, e);
            self.finish_failed(task_id, &FailureKind::internal("storage"));
            return;
        }

        let total_secs = started.elapsed().as_secs_f64();
        self.record_duration(task_id, Phase::Total, total_secs);
        self.record_transition(task_id, TaskStatus::Processing, TaskStatus::Completed, None);

        TASKS_FINISHED.with_label_values(&["completed"]).inc();
        PANELS_PER_COMIC
            .with_label_values(&[])
            .observe(comic.image_urls.len() as f64);
        info!(
            task_id,
            panels = comic.image_urls.len(),
            total_secs,
            "Comic completed"
        );

        self.notifier.notify(Notification::TaskCompleted {
            task_id: task_id.to_string(),
            text: text.to_string(),
            image_urls: comic.image_urls,
            total_secs,
        });
    }

    fn finish_failed(&self, task_id: &str, kind: &FailureKind) {
        let message = kind.user_message();
        if let Err(e) = self
            .store
            .mark_failed(task_id, TaskStatus::Processing, &message)
        {
            warn!("Could not mark task {} failed: {}", task_id, e);
            return;
        }

        self.record_transition(
            task_id,
            TaskStatus::Processing,
            TaskStatus::Failed,
            Some(kind.name().to_string()),
        );
        TASKS_FINISHED.with_label_values(&["failed"]).inc();
        FAILURES.with_label_values(&[kind.name()]).inc();
        warn!(task_id, kind = kind.name(), "Comic failed");

        self.notifier.notify(Notification::TaskFailed {
            task_id: task_id.to_string(),
            error: message,
        });
    }

    /// Fail a task whose continuation was cut short by shutdown.
    fn finish_interrupted(&self, task_id: &str, from: TaskStatus) {
        if from == TaskStatus::Pending {
            if let Err(e) =
                self.store
                    .transition(task_id, TaskStatus::Pending, TaskStatus::Processing)
            {
                warn!("Could not interrupt task {}: {}", task_id, e);
                return;
            }
            self.record_transition(task_id, TaskStatus::Pending, TaskStatus::Processing, None);
        }

        if let Err(e) = self
            .store
            .mark_failed(task_id, TaskStatus::Processing, INTERRUPTED_MESSAGE)
        {
            warn!("Could not mark task {} interrupted: {}", task_id, e);
            return;
        }
        self.record_transition(
            task_id,
            TaskStatus::Processing,
            TaskStatus::Failed,
            Some("interrupted".to_string()),
        );
        TASKS_FINISHED.with_label_values(&["failed"]).inc();
        FAILURES.with_label_values(&["interrupted"]).inc();
        warn!(task_id, "Comic interrupted by shutdown");

        self.notifier.notify(Notification::TaskFailed {
            task_id: task_id.to_string(),
            error: INTERRUPTED_MESSAGE.to_string(),
        });
    }

    async fn upload_attachments(&self, task_id: &str, images: &[ImageData]) {
        let artifacts = self.artifacts.as_ref();
        let uploads = images.iter().map(|image| {
            let call = ExternalCall::new("storage", "store", artifacts.backend())
                .for_task(task_id)
                .with_request(json!({
                    "kind": ArtifactKind::Attachment.as_str(),
                    "image": image_summary(image),
                }));
            async move {
                invoke(
                    &self.config.retry,
                    self.audit.as_ref(),
                    &call,
                    |url: &String| json!({ "url": url }),
                    move || artifacts.store(ArtifactKind::Attachment, image),
                )
                .await
            }
        });

        let urls = match futures::future::try_join_all(uploads).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!("Failed to store attachments for task {}: {}", task_id, e);
                return;
            }
        };

        if let Err(e) = self.store.set_attachment_urls(task_id, &urls) {
            warn!("Failed to record attachments for task {}: {}", task_id, e);
            return;
        }
        info!(task_id, count = urls.len(), "Attachments stored");
        self.emit(AuditEvent::AttachmentsStored {
            task_id: task_id.to_string(),
            urls,
        });
    }
}

/// Background half of an accepted submission.
async fn run_continuation(
    inner: Arc<Inner>,
    task_id: String,
    text: Arc<str>,
    token: CancellationToken,
    scenario: JoinHandle<ScenarioOutcome>,
    started: Instant,
) {
    // Only shutdown cancels an accepted task's token.
    if token.is_cancelled() {
        debug!(task_id = %task_id, "Continuation cancelled before start");
        inner.finish_interrupted(&task_id, TaskStatus::Pending);
        return;
    }

    if let Err(e) = inner
        .store
        .transition(&task_id, TaskStatus::Pending, TaskStatus::Processing)
    {
        warn!("Task {} cannot start processing: {}", task_id, e);
        token.cancel();
        return;
    }
    inner.record_transition(&task_id, TaskStatus::Pending, TaskStatus::Processing, None);

    TASKS_IN_FLIGHT.inc();
    let production = AssertUnwindSafe(inner.produce(&task_id, scenario)).catch_unwind();
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = production => Some(result),
    };
    TASKS_IN_FLIGHT.dec();

    match outcome {
        None => inner.finish_interrupted(&task_id, TaskStatus::Processing),
        Some(Ok(Ok(comic))) => inner.finish_completed(&task_id, &text, comic, started),
        Some(Ok(Err(kind))) => inner.finish_failed(&task_id, &kind),
        Some(Err(panic)) => {
            error!(task_id = %task_id, "Comic production panicked: {}", panic_message(&panic));
            inner.finish_failed(&task_id, &FailureKind::internal("internal"));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn input_summary(text: &str, images: &[ImageData]) -> Value {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    json!({
        "text_chars": text.chars().count(),
        "preview": preview,
        "images": images.iter().map(image_summary).collect::<Vec<_>>(),
    })
}

fn image_summary(image: &ImageData) -> Value {
    json!({ "mime_type": image.mime_type, "bytes": image.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use crate::task::SqliteTaskStore;
    use crate::testing::{fixtures, MockAnalyzer, MockArtifactStore, MockImageGenerator};

    fn orchestrator(analyzer: Arc<MockAnalyzer>) -> (ComicOrchestrator, Arc<dyn TaskStore>) {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let orchestrator = ComicOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&store),
            Collaborators {
                analyzer,
                generator: Arc::new(MockImageGenerator::new()),
                sheet_generator: None,
                artifacts: Arc::new(MockArtifactStore::new()),
                notifier: Arc::new(NoopNotifier),
            },
            None,
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_too_many_attachments_creates_no_task() {
        let (orchestrator, store) = orchestrator(Arc::new(MockAnalyzer::new()));
        let images = vec![ImageData::png(vec![1]); 4];

        let err = orchestrator
            .submit(Submission::new("hello").with_images(images))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::TooManyAttachments { count: 4, max: 3 }
        ));
        assert_eq!(store.count(&TaskFilter::new()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_rejected_without_remote_call() {
        let analyzer = Arc::new(MockAnalyzer::new());
        let (orchestrator, _) = orchestrator(Arc::clone(&analyzer));

        let outcome = orchestrator.submit(Submission::new("   ")).await.unwrap();

        assert!(outcome.is_rejected());
        assert_eq!(outcome.reject_reason.as_deref(), Some("Input is empty."));
        assert!(analyzer.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_keeps_task_pending() {
        let analyzer = Arc::new(MockAnalyzer::new());
        analyzer.fail_validation(3, fixtures::overloaded()).await;
        let (orchestrator, _) = orchestrator(Arc::clone(&analyzer));

        let err = orchestrator
            .submit(Submission::new(fixtures::meeting_notes()))
            .await
            .unwrap_err();

        let OrchestratorError::Validation { task_id, .. } = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(analyzer.call_count("validate").await, 3);
        let task = orchestrator.get_status(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!orchestrator.is_running(&task_id));
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (orchestrator, _) = orchestrator(Arc::new(MockAnalyzer::new()));

        assert!(matches!(
            orchestrator.get_status("missing"),
            Err(OrchestratorError::TaskNotFound(_))
        ));
        assert!(matches!(
            orchestrator.get_result("missing"),
            Err(OrchestratorError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_interrupted_fails_unfinished_tasks() {
        let (orchestrator, store) = orchestrator(Arc::new(MockAnalyzer::new()));
        let create = |text: &str| {
            store
                .create(CreateTaskRequest {
                    input_text: text.to_string(),
                    attachment_count: 0,
                })
                .unwrap()
        };
        let running = create("left behind");
        store
            .transition(&running.id, TaskStatus::Pending, TaskStatus::Processing)
            .unwrap();
        let accepted = create("accepted, never started");
        store.record_validation(&accepted.id, true, None, &[]).unwrap();

        let recovered = orchestrator.recover_interrupted().unwrap();

        assert_eq!(recovered, vec![running.id.clone(), accepted.id.clone()]);
        for id in &recovered {
            let task = orchestrator.get_status(id).unwrap();
            assert_eq!(task.status, TaskStatus::Failed);
            assert_eq!(task.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let (orchestrator, _) = orchestrator(Arc::new(MockAnalyzer::new()));
        orchestrator.shutdown().await;

        assert!(!orchestrator.status().accepting);
        assert!(matches!(
            orchestrator.submit(Submission::new("hello")).await,
            Err(OrchestratorError::ShuttingDown)
        ));
    }
}
