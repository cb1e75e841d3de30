//! Prompts and response schemas for the analyzer.

use serde_json::{json, Value};

pub const VALIDATION_SYSTEM: &str = "\
You screen submissions for a service that turns meeting notes, stories and \
everyday anecdotes into short webtoon-style comics.

Accept any input that describes people, events or a situation that can be \
drawn. Reject input that is gibberish, only a URL or code, a request to \
perform some other task, or content that is hateful, sexual or violent.

When you accept, write one to three short, friendly messages telling the \
user what you are about to draw. When you reject, explain the reason in one \
sentence addressed to the user.";

pub const SCENARIO_SYSTEM: &str = "\
You turn the user's text into a comic scenario made of episodes. Each episode \
becomes one illustration.

Rules for image_prompt:
- write it in English
- describe the characters, their appearance, the setting and the action concretely
- repeat each character's appearance in every episode where they appear
- do not mention art style, it is added later

Use between 1 and 6 episodes, numbered from 1 without gaps. Use a single \
episode only when the text describes a single moment.";

fn attachment_note(image_count: usize) -> String {
    match image_count {
        0 => String::new(),
        1 => "\nOne image is attached; use it as visual context.\n".to_string(),
        n => format!("\n{} images are attached; use them as visual context.\n", n),
    }
}

pub fn validation_prompt(text: &str, image_count: usize) -> String {
    format!(
        "Decide whether the following input can become a comic.{}\n---\n{}\n---",
        attachment_note(image_count),
        text
    )
}

pub fn scenario_prompt(text: &str, image_count: usize) -> String {
    format!(
        "Turn the following input into a comic scenario.{}\n---\n{}\n---",
        attachment_note(image_count),
        text
    )
}

pub fn validation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "required": ["is_valid"],
        "properties": {
            "is_valid": { "type": "BOOLEAN" },
            "reject_reason": { "type": "STRING" },
            "messages": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    })
}

pub fn scenario_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "required": ["index", "description", "image_prompt"],
            "properties": {
                "index": { "type": "INTEGER" },
                "description": { "type": "STRING" },
                "dialogue": { "type": "STRING" },
                "image_prompt": { "type": "STRING" }
            }
        }
    })
}
