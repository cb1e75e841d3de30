use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{ArtifactKind, ArtifactStore};
use crate::imaging::ImageData;
use crate::service::ServiceError;

/// Content-addressed files under a local directory.
///
/// Files land at `<root>/<kind>/<sha256>.<ext>` and are published as
/// `<public_base_url>/<kind>/<sha256>.<ext>`.
pub struct FsArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(image: &ImageData) -> String {
        format!("{:x}.{}", Sha256::digest(&image.bytes), image.extension())
    }
}

fn storage_err(e: std::io::Error) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn backend(&self) -> &str {
        "fs"
    }

    async fn store(&self, kind: ArtifactKind, image: &ImageData) -> Result<String, ServiceError> {
        if image.is_empty() {
            return Err(ServiceError::Storage("refusing to store an empty image".to_string()));
        }

        let dir = self.root.join(kind.as_str());
        let name = Self::file_name(image);
        let path = dir.join(&name);

        if !tokio::fs::try_exists(&path).await.map_err(storage_err)? {
            tokio::fs::create_dir_all(&dir).await.map_err(storage_err)?;
            // Write then rename so readers never see a partial file.
            let tmp = dir.join(format!("{}.{}.tmp", name, uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, &image.bytes)
                .await
                .map_err(storage_err)?;
            tokio::fs::rename(&tmp, &path).await.map_err(storage_err)?;
            tracing::debug!(path = %path.display(), bytes = image.len(), "Stored artifact");
        }

        Ok(format!("{}/{}/{}", self.public_base_url, kind.as_str(), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_content_addressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), "http://localhost:8080/artifacts/");

        let image = ImageData::png(b"not really a png".to_vec());
        let url = store.store(ArtifactKind::Panel, &image).await.unwrap();

        assert!(url.starts_with("http://localhost:8080/artifacts/panels/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let on_disk = std::fs::read(dir.path().join("panels").join(name)).unwrap();
        assert_eq!(on_disk, image.bytes);
    }

    #[tokio::test]
    async fn test_file_name_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), "http://x");

        let url = store
            .store(ArtifactKind::Panel, &ImageData::png(b"test".to_vec()))
            .await
            .unwrap();
        assert_eq!(
            url,
            "http://x/panels/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08.png"
        );
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), "http://x");

        let image = ImageData::new("image/jpeg", vec![1, 2, 3]);
        let first = store.store(ArtifactKind::CharacterSheet, &image).await.unwrap();
        let second = store.store(ArtifactKind::CharacterSheet, &image).await.unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with(".jpg"));

        let other = store
            .store(ArtifactKind::CharacterSheet, &ImageData::new("image/jpeg", vec![4]))
            .await
            .unwrap();
        assert_ne!(first, other);

        let files = std::fs::read_dir(dir.path().join("sheets")).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_store_rejects_empty_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path(), "http://x");
        let err = store
            .store(ArtifactKind::Attachment, &ImageData::png(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
