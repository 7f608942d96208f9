//! Wait-then-retry wrapper for remote calls.

use std::future::Future;

use tracing::{info, warn};

use super::scheduler::PollState;
use super::wait::{Suspender, WaitOutcome, WaitReason};
use crate::error::{Result, RoverError};
use crate::repo::RepositoryTarget;

/// Wraps remote calls so a rate-limit signal suspends the caller and retries once.
///
/// Each limiting event yields exactly one wait followed by one retry; the
/// retry's result is returned as-is, including a second rate limit. Every
/// other error passes through untouched.
#[derive(Clone)]
pub struct RateLimiter {
    suspender: Suspender,
}

impl RateLimiter {
    /// Creates a rate limiter that suspends through `suspender`.
    pub fn new(suspender: Suspender) -> Self {
        Self { suspender }
    }

    /// Invokes `operation`, waiting out a rate limit before a single retry.
    pub async fn call<F, Fut, T>(&self, target: &RepositoryTarget, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry_after = match operation().await {
            Err(RoverError::RateLimited { retry_after }) => retry_after,
            other => return other,
        };

        warn!(
            repo = %target,
            retry_after_secs = retry_after.as_secs(),
            "Rate limit exceeded, backing off before retry"
        );
        self.suspender
            .observer()
            .on_state(target, &PollState::Backoff(retry_after));

        match self
            .suspender
            .suspend(target, WaitReason::RateLimit, retry_after)
            .await
        {
            WaitOutcome::Elapsed => {
                info!(repo = %target, "Retrying after rate limit");
                self.suspender.observer().on_state(target, &PollState::Detecting);
                operation().await
            }
            WaitOutcome::Cancelled => Err(RoverError::RateLimited { retry_after }),
        }
    }
}
