//! Plumbing shared by every external collaborator call.
//!
//! - [`ServiceError`]: the failure type every collaborator returns
//! - [`FailureKind`]: user-facing classification of a failure
//! - [`retry`]: bounded retry of a single call
//! - [`invoke`]: retry plus one audit record per attempt

mod call;
mod classify;
mod error;
mod retry;

pub use call::{invoke, ExternalCall};
pub use classify::FailureKind;
pub use error::ServiceError;
pub use retry::{retry, Backoff, RetryPolicy};
