//! Google Gemini `generateContent` transport shared by the analyzer and the
//! image generator.

mod client;
mod wire;

pub use client::{GeminiClient, DEFAULT_API_BASE};
pub use wire::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, Part, PromptFeedback,
};
