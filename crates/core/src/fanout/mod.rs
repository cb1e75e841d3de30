//! Scenario fan-out: turns episodes into ordered, stored images.

mod engine;
mod prompts;

pub use engine::{FanOutEngine, FanOutError, RenderOutput, RenderProgress};
pub use prompts::{character_sheet_prompt, reference_prompt, styled_prompt, DEFAULT_STYLE_PREFIX};
