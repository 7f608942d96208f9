//! Cancellable waits with countdown reporting.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::observer::PollObserver;
use crate::repo::RepositoryTarget;

/// Default granularity of countdown ticks and cancellation checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Why a target's loop is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Waiting out the poll interval.
    Interval,
    /// Waiting out a remote rate limit.
    RateLimit,
}

/// How a suspension ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed.
    Elapsed,
    /// Shutdown was requested before the duration passed.
    Cancelled,
}

/// Suspends the calling loop only, reporting a countdown and honouring shutdown.
#[derive(Clone)]
pub struct Suspender {
    cancel: CancellationToken,
    observer: Arc<dyn PollObserver>,
    tick: Duration,
}

impl Suspender {
    /// Creates a suspender tied to a shutdown token.
    pub fn new(cancel: CancellationToken, observer: Arc<dyn PollObserver>) -> Self {
        Self {
            cancel,
            observer,
            tick: DEFAULT_TICK,
        }
    }

    /// Overrides the countdown tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Returns the observer progress is reported to.
    pub fn observer(&self) -> &dyn PollObserver {
        self.observer.as_ref()
    }

    /// Returns true once shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suspends for `duration`, ticking the observer and returning early on shutdown.
    pub async fn suspend(
        &self,
        target: &RepositoryTarget,
        reason: WaitReason,
        duration: Duration,
    ) -> WaitOutcome {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            self.observer.on_countdown(target, reason, remaining);

            let step = remaining.min(self.tick);
            tokio::select! {
                () = self.cancel.cancelled() => return WaitOutcome::Cancelled,
                () = tokio::time::sleep(step) => {}
            }
            remaining = remaining.saturating_sub(step);
        }

        if self.cancel.is_cancelled() {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Elapsed
        }
    }
}
