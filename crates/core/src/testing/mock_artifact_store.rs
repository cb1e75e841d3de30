//! Mock artifact store for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::imaging::ImageData;
use crate::service::ServiceError;

/// One stored artifact.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub kind: ArtifactKind,
    pub url: String,
    pub image: ImageData,
}

/// In-memory [`ArtifactStore`] handing out `mock://<kind>/<n>` URLs.
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    stored: Arc<RwLock<Vec<StoredArtifact>>>,
    next_errors: Arc<RwLock<VecDeque<ServiceError>>>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` store calls.
    pub async fn fail_next(&self, times: usize, error: ServiceError) {
        let mut errors = self.next_errors.write().await;
        errors.extend(std::iter::repeat(error).take(times));
    }

    pub async fn stored(&self) -> Vec<StoredArtifact> {
        self.stored.read().await.clone()
    }

    pub async fn stored_of_kind(&self, kind: ArtifactKind) -> Vec<StoredArtifact> {
        self.stored
            .read()
            .await
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }

    /// Look up what was stored under `url`.
    pub async fn get(&self, url: &str) -> Option<ImageData> {
        self.stored
            .read()
            .await
            .iter()
            .find(|a| a.url == url)
            .map(|a| a.image.clone())
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    fn backend(&self) -> &str {
        "mock"
    }

    async fn store(&self, kind: ArtifactKind, image: &ImageData) -> Result<String, ServiceError> {
        if let Some(error) = self.next_errors.write().await.pop_front() {
            return Err(error);
        }

        let mut stored = self.stored.write().await;
        if let Some(existing) = stored
            .iter()
            .find(|a| a.kind == kind && a.image == *image)
        {
            return Ok(existing.url.clone());
        }

        let url = format!("mock://{}/{}", kind.as_str(), stored.len() + 1);
        stored.push(StoredArtifact {
            kind,
            url: url.clone(),
            image: image.clone(),
        });
        Ok(url)
    }
}
