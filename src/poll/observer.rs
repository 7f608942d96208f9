//! Progress callbacks for the polling loop.

use std::time::Duration;

use super::scheduler::{CycleOutcome, PollState};
use super::wait::WaitReason;
use crate::repo::RepositoryTarget;

/// Receives progress from polling loops.
///
/// Every method has an empty default so observers only implement what they
/// render. Calls arrive from every target's task, so implementations must not
/// block.
pub trait PollObserver: Send + Sync {
    /// Called when a target's loop enters a new state.
    fn on_state(&self, _target: &RepositoryTarget, _state: &PollState) {}

    /// Called once per tick while a target is suspended.
    fn on_countdown(&self, _target: &RepositoryTarget, _reason: WaitReason, _remaining: Duration) {}

    /// Called after each completed cycle.
    fn on_cycle(&self, _target: &RepositoryTarget, _outcome: &CycleOutcome) {}
}

/// Observer that ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PollObserver for NoopObserver {}
