//! Testing utilities and mock implementations of every collaborator.
//!
//! # Example
//!
//! ```rust,ignore
//! use toonmill_core::testing::{fixtures, MockAnalyzer, MockImageGenerator};
//!
//! let analyzer = MockAnalyzer::new();
//! analyzer.set_scenario(fixtures::episodes(4)).await;
//!
//! let images = MockImageGenerator::new();
//! images
//!     .fail_when_prompt_contains("EPISODE-3", 2, fixtures::overloaded())
//!     .await;
//! ```

mod mock_analyzer;
mod mock_artifact_store;
mod mock_image_generator;
mod mock_notifier;

pub use mock_analyzer::{MockAnalyzer, RecordedAnalysis};
pub use mock_artifact_store::{MockArtifactStore, StoredArtifact};
pub use mock_image_generator::{MockImageGenerator, RecordedImageCall};
pub use mock_notifier::MockNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::analyzer::Episode;
    use crate::service::ServiceError;

    /// `n` episodes whose prompts carry their own index (`EPISODE-<i>`).
    pub fn episodes(n: u32) -> Vec<Episode> {
        (1..=n)
            .map(|i| {
                Episode::new(i, format!("EPISODE-{} a cat presenting slide {}", i, i))
                    .with_description(format!("Panel {}", i))
            })
            .collect()
    }

    /// A short text the mocks accept.
    pub fn meeting_notes() -> String {
        "Weekly sync: Mina demoed the new onboarding flow, Joon promised to fix the \
         flaky deploy before Friday, and everyone agreed to ban meetings after 5pm."
            .to_string()
    }

    pub fn overloaded() -> ServiceError {
        ServiceError::Api {
            status: 503,
            message: "The model is overloaded. Please try again later.".to_string(),
        }
    }

    pub fn rate_limited() -> ServiceError {
        ServiceError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
        }
    }
}
