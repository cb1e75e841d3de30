//! Comic orchestrator: validation, scenario generation and rendering.
//!
//! Submissions are validated on the request path while the scenario is
//! generated concurrently. Accepted tasks continue in the background:
//! - **Continuation**: scenario -> character sheet -> episodes -> comic
//! - **Upload**: attached images copied to the artifact store
//!
//! Both are supervised per task and cancelled on rejection or shutdown.

mod config;
mod registry;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{Collaborators, ComicOrchestrator};
pub use types::{ComicResult, OrchestratorError, OrchestratorStatus, SubmitOutcome, Submission};
