pub mod analyzer;
pub mod artifact;
pub mod audit;
pub mod config;
pub mod fanout;
pub mod gemini;
pub mod imaging;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod service;
pub mod task;
pub mod testing;

pub use analyzer::{
    normalize_episodes, precheck, ContentAnalyzer, Episode, GeminiAnalyzer, ValidationResult,
};
pub use artifact::{ArtifactKind, ArtifactStore, FsArtifactStore};
pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, CallStatus, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use fanout::{FanOutEngine, FanOutError, RenderOutput, RenderProgress};
pub use imaging::{
    GeminiImageGenerator, ImageData, ImageDecodeError, ImageFetcher, ImageGenerator,
};
pub use notify::{NoopNotifier, Notification, NotificationSink, TelegramNotifier};
pub use orchestrator::{
    Collaborators, ComicOrchestrator, ComicResult, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, SubmitOutcome, Submission,
};
pub use service::{invoke, retry, Backoff, ExternalCall, FailureKind, RetryPolicy, ServiceError};
pub use task::{
    Comic, CreateTaskRequest, Phase, PhaseDurations, SqliteTaskStore, Task, TaskError,
    TaskFilter, TaskStatus, TaskStore,
};
