use std::sync::Arc;
use toonmill_core::{AuditStore, ComicOrchestrator, Config, ImageFetcher, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<ComicOrchestrator>,
    audit_store: Arc<dyn AuditStore>,
    image_fetcher: ImageFetcher,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<ComicOrchestrator>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            audit_store,
            image_fetcher: ImageFetcher::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &ComicOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn image_fetcher(&self) -> &ImageFetcher {
        &self.image_fetcher
    }
}
