//! Polling core: rate limiting, change detection, and the per-target loop.
//!
//! Control flow for one cycle:
//!
//! ```text
//! PollScheduler -> ChangeDetector -> RateLimiter(remote call)
//!               -> HistoryRecorder::append -> StateStore::write
//! ```

pub mod detect;
pub mod observer;
pub mod rate_limit;
pub mod scheduler;
pub mod wait;

pub use detect::ChangeDetector;
pub use observer::{NoopObserver, PollObserver};
pub use rate_limit::RateLimiter;
pub use scheduler::{CycleOutcome, PollScheduler, PollState};
pub use wait::{Suspender, WaitOutcome, WaitReason};
