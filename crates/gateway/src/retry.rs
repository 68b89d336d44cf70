use std::future::Future;
use std::time::Duration;

use crate::{GatewayError, Result};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `attempt` until it succeeds, the attempts run out, or it fails
    /// with an error that retrying cannot fix.
    ///
    /// `CallNotPermitted` and `NotFound` end the loop immediately.
    pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut number = 1;
        loop {
            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(err) if !Self::is_retryable(&err) || number >= max_attempts => {
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(attempt = number, max_attempts, error = %err, "retrying call");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    number += 1;
                }
            }
        }
    }

    fn is_retryable(err: &GatewayError) -> bool {
        err.is_dependency_failure()
    }
}
