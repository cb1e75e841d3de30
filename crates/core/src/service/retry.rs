//! Bounded retry for a single external call.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Double the delay after every failed attempt, capped at `max_delay_ms`.
    Exponential,
}

/// How many times a call is attempted and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: Backoff,

    /// Delay before the second attempt when backoff is exponential.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    16_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(default_max_attempts())
    }
}

impl RetryPolicy {
    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }

    /// Retry with exponentially growing delays.
    pub fn exponential(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential,
            initial_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one.
    pub fn delay_after(&self, failed_attempt: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Exponential => {
                let shift = failed_attempt.saturating_sub(1).min(20);
                let delay = self
                    .initial_delay_ms
                    .saturating_mul(1u64 << shift)
                    .min(self.max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// unchanged so callers can classify it.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation, attempt, max_attempts, e
                );
                if attempt >= max_attempts {
                    return Err(e);
                }
                crate::metrics::RETRY_ATTEMPTS
                    .with_label_values(&[operation])
                    .inc();
                if let Some(delay) = policy.delay_after(attempt) {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
