//! Content analysis collaborator: input validation and scenario generation.

mod gemini;
mod prompts;
mod traits;
mod types;

pub use gemini::GeminiAnalyzer;
pub use traits::ContentAnalyzer;
pub use types::{
    normalize_episodes, precheck, Episode, ValidationResult, MAX_INPUT_CHARS,
};
