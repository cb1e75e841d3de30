//! Prompt builders for the two rendering phases.

use crate::analyzer::Episode;

/// Style applied to every prompt that does not use a reference image.
pub const DEFAULT_STYLE_PREFIX: &str = "2D webtoon style, bold black outlines, flat colors, \
     minimal shading, SD/chibi proportions with large heads and expressive faces.";

const SHEET_HEADER: &str = "\
Based on the following episode descriptions, create a single CHARACTER SHEET image that includes:
1. ALL main characters, each shown exactly once, standing in a neutral pose with a calm expression
2. the overall art style to be used for every episode
3. a representative background tone
Do not depict any action or scene from the episodes. Keep the characters side by side on a plain background.";

const REFERENCE_INSTRUCTION: &str = "\
Use the character sheet image above as a strict reference. Keep identical character designs \
(faces, hair, outfits and proportions), the identical line and coloring style, the identical \
color palette and the identical background tone. Draw only the following scene.";

pub fn styled_prompt(style_prefix: &str, prompt: &str) -> String {
    if style_prefix.trim().is_empty() {
        return prompt.to_string();
    }
    format!("{}\n\n{}", style_prefix.trim(), prompt)
}

pub fn character_sheet_prompt(style_prefix: &str, episodes: &[Episode]) -> String {
    let descriptions = episodes
        .iter()
        .map(|e| format!("Episode {}:\n{}", e.index, e.image_prompt))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = format!("{}\n\nEpisode descriptions:\n{}", SHEET_HEADER, descriptions);
    if !style_prefix.trim().is_empty() {
        prompt.push_str("\n\nStyle: ");
        prompt.push_str(style_prefix.trim());
    }
    prompt
}

pub fn reference_prompt(prompt: &str) -> String {
    format!("{}\n\nScene: {}", REFERENCE_INSTRUCTION, prompt)
}
