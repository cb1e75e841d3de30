use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("data URL declares '{0}', which is not an image type")]
    NotAnImage(String),
}

/// Raw image bytes with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image/png", bytes)
    }

    /// Guess the MIME type from magic bytes, falling back to PNG.
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime = if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "image/jpeg"
        } else if bytes.starts_with(b"GIF8") {
            "image/gif"
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            "image/webp"
        } else {
            "image/png"
        };
        Self::new(mime, bytes)
    }

    /// Decode a base64 payload, accepting an optional `data:image/<type>;base64,`
    /// prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, ImageDecodeError> {
        let encoded = encoded.trim();
        if let Some(rest) = encoded.strip_prefix("data:") {
            if let Some((mime, data)) = rest.split_once(";base64,") {
                let mime = mime.trim().to_lowercase();
                if !mime.starts_with("image/") {
                    return Err(ImageDecodeError::NotAnImage(mime));
                }
                return Ok(Self::new(mime, STANDARD.decode(data)?));
            }
        }
        Ok(Self::sniff(STANDARD.decode(encoded)?))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// File extension for the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "png",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image payloads are large; never dump them into logs.
impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
