//! Storage for generated and uploaded images.

mod fs_store;

use async_trait::async_trait;

use crate::imaging::ImageData;
use crate::service::ServiceError;

pub use fs_store::FsArtifactStore;

/// What an artifact is, used to group stored files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Panel,
    CharacterSheet,
    Attachment,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Panel => "panels",
            ArtifactKind::CharacterSheet => "sheets",
            ArtifactKind::Attachment => "attachments",
        }
    }
}

/// Persists image bytes and returns a URL they can be fetched from.
///
/// Storing the same bytes twice returns the same URL.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Backend identifier, recorded in audit events.
    fn backend(&self) -> &str;

    async fn store(&self, kind: ArtifactKind, image: &ImageData) -> Result<String, ServiceError>;
}
