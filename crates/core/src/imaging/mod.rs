//! Image generation collaborator.

mod fetch;
mod gemini;
mod traits;
mod types;

pub use fetch::{ImageFetcher, DEFAULT_FETCH_TIMEOUT, MAX_IMAGE_URLS};
pub use gemini::GeminiImageGenerator;
pub use traits::ImageGenerator;
pub use types::{ImageData, ImageDecodeError};
