//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::analyzer::MAX_INPUT_CHARS;
use crate::fanout::DEFAULT_STYLE_PREFIX;
use crate::service::RetryPolicy;

/// Configuration for the comic orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Longer input (in characters) is rejected without calling the analyzer.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// More attached images than this is refused before a task is created.
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Prepended to every prompt drawn without a reference image.
    #[serde(default = "default_style_prefix")]
    pub style_prefix: String,

    /// How long `shutdown` waits for running continuations (seconds).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Retry budget applied to every collaborator call.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_max_input_chars() -> usize {
    MAX_INPUT_CHARS
}

fn default_max_attachments() -> usize {
    3
}

fn default_style_prefix() -> String {
    DEFAULT_STYLE_PREFIX.to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_attachments: default_max_attachments(),
            style_prefix: default_style_prefix(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}
