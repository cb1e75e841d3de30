//! Download of images a submission references by URL.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use super::ImageData;
use crate::service::ServiceError;

/// URLs beyond this many are ignored.
pub const MAX_IMAGE_URLS: usize = 5;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Fetches attachment images over HTTP.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Download one image.
    ///
    /// The response must be a 2xx whose content type is `image/*`, or the
    /// URL must end in a known image extension.
    pub async fn fetch(&self, url: &str) -> Result<ImageData, ServiceError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: format!("download of {} failed", url),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let mime = downloaded_mime(url, content_type.as_deref()).ok_or_else(|| {
            ServiceError::Malformed(format!(
                "{} is not an image ({})",
                url,
                content_type.as_deref().unwrap_or("no content type")
            ))
        })?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;
        if bytes.is_empty() {
            return Err(ServiceError::Empty(format!("{} returned no bytes", url)));
        }

        Ok(match mime {
            Some(mime) => ImageData::new(mime, bytes.to_vec()),
            None => ImageData::sniff(bytes.to_vec()),
        })
    }

    /// Download the first [`MAX_IMAGE_URLS`] URLs concurrently, in order.
    /// Failed downloads are logged and skipped.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<ImageData> {
        if urls.len() > MAX_IMAGE_URLS {
            debug!(
                given = urls.len(),
                kept = MAX_IMAGE_URLS,
                "Ignoring extra image URLs"
            );
        }

        let downloads = urls
            .iter()
            .take(MAX_IMAGE_URLS)
            .map(|url| async move { (url, self.fetch(url).await) });

        join_all(downloads)
            .await
            .into_iter()
            .filter_map(|(url, result)| match result {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(url = %url, "Skipping image URL: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl Default for ImageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

/// `Some(Some(mime))` for an `image/*` content type, `Some(None)` when only
/// the URL looks like an image, `None` when neither does.
fn downloaded_mime(url: &str, content_type: Option<&str>) -> Option<Option<String>> {
    let declared = content_type
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_lowercase())
        .filter(|mime| mime.starts_with("image/"));
    if declared.is_some() {
        return Some(declared);
    }

    let path = url.split(['?', '#']).next().unwrap_or_default().to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext))
        .then_some(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type_wins() {
        assert_eq!(
            downloaded_mime("https://x/pic", Some("image/webp; charset=binary")),
            Some(Some("image/webp".to_string()))
        );
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(
            downloaded_mime("https://x/board.JPG?size=large", Some("application/octet-stream")),
            Some(None)
        );
        assert_eq!(downloaded_mime("https://x/board.png", None), Some(None));
    }

    #[test]
    fn test_neither_type_nor_extension() {
        assert_eq!(downloaded_mime("https://x/page", Some("text/html")), None);
        assert_eq!(downloaded_mime("https://x/notes.txt", None), None);
    }

    #[tokio::test]
    async fn test_unreachable_urls_are_skipped() {
        let fetcher = ImageFetcher::new(Duration::from_secs(1));
        let urls = vec!["http://127.0.0.1:9/a.png".to_string()];
        assert!(fetcher.fetch_all(&urls).await.is_empty());
    }
}
