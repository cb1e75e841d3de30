use serde::{Deserialize, Serialize};

use crate::imaging::ImageData;
use crate::service::ServiceError;

/// One unit of a generated scenario; rendered as one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// 1-based position in the scenario.
    #[serde(alias = "episode_number", alias = "panel_number")]
    pub index: u32,
    /// Model input for the image generator.
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,
}

impl Episode {
    pub fn new(index: u32, image_prompt: impl Into<String>) -> Self {
        Self {
            index,
            image_prompt: image_prompt.into(),
            description: None,
            dialogue: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_dialogue(mut self, dialogue: impl Into<String>) -> Self {
        self.dialogue = Some(dialogue.into());
        self
    }
}

/// Sort a scenario by index and check it is non-empty, dense and 1-based.
pub fn normalize_episodes(mut episodes: Vec<Episode>) -> Result<Vec<Episode>, ServiceError> {
    if episodes.is_empty() {
        return Err(ServiceError::Empty("scenario has no episodes".to_string()));
    }

    episodes.sort_by_key(|e| e.index);

    for (position, episode) in episodes.iter().enumerate() {
        let expected = position as u32 + 1;
        if episode.index != expected {
            let indices: Vec<u32> = episodes.iter().map(|e| e.index).collect();
            return Err(ServiceError::Malformed(format!(
                "episode indices must be dense and start at 1, got {:?}",
                indices
            )));
        }
        if episode.image_prompt.trim().is_empty() {
            return Err(ServiceError::Malformed(format!(
                "episode {} has an empty image prompt",
                episode.index
            )));
        }
    }

    Ok(episodes)
}

/// Outcome of input validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub reject_reason: Option<String>,
    /// Presentation messages shown to the user on acceptance.
    #[serde(default)]
    pub messages: Vec<String>,
}

impl ValidationResult {
    pub fn accept(messages: Vec<String>) -> Self {
        Self {
            is_valid: true,
            reject_reason: None,
            messages,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reject_reason: Some(reason.into()),
            messages: Vec::new(),
        }
    }
}

/// Default cap on input length, in characters.
pub const MAX_INPUT_CHARS: usize = 30_000;

/// Checks that decide a submission without asking the analyzer.
///
/// Returns `Some(rejection)` for empty input or text longer than `max_chars`
/// characters.
pub fn precheck(text: &str, images: &[ImageData], max_chars: usize) -> Option<ValidationResult> {
    if text.trim().is_empty() && images.is_empty() {
        return Some(ValidationResult::reject("Input is empty."));
    }

    let chars = text.chars().count();
    if chars > max_chars {
        return Some(ValidationResult::reject(format!(
            "Input is too long: {} characters exceeds the limit of {}.",
            chars, max_chars
        )));
    }

    None
}
