//! Per-repository polling loop.
//!
//! ```text
//! Idle -> Waiting(interval) -> Detecting -> Recording -> Idle
//!                                        -> Idle                  (no change)
//!                                        -> Backoff -> Detecting  (rate limited, once)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::detect::ChangeDetector;
use super::wait::{Suspender, WaitOutcome, WaitReason};
use crate::error::{ErrorKind, Result, RoverError};
use crate::repo::{short_sha, LastSeenMarker, RepositoryTarget};
use crate::store::{HistoryRecorder, MarkerUpdate, StateStore};

/// State of one target's polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Between cycles.
    Idle,
    /// Waiting out the poll interval.
    Waiting(Duration),
    /// Asking the remote for new commits.
    Detecting,
    /// Waiting out a rate limit before retrying the remote call.
    Backoff(Duration),
    /// Appending history and advancing the marker.
    Recording,
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The remote head matched the stored marker, or the repository is empty.
    NoChange,
    /// New commits were appended and the marker advanced.
    Recorded {
        /// Commits stored for the first time.
        new_commits: usize,
        /// Marker after the cycle.
        marker: LastSeenMarker,
    },
    /// The cycle failed; the marker is unchanged and the next interval retries.
    Skipped(RoverError),
}

/// Drives the polling state machine for one repository.
///
/// Cycles for a target never overlap. Independent targets each get their own
/// scheduler and share only the history recorder.
pub struct PollScheduler {
    target: RepositoryTarget,
    interval: Duration,
    detector: ChangeDetector,
    state: Arc<dyn StateStore>,
    recorder: Arc<dyn HistoryRecorder>,
    suspender: Suspender,
}

impl PollScheduler {
    /// Creates a scheduler for `target`.
    pub fn new(
        target: RepositoryTarget,
        interval: Duration,
        detector: ChangeDetector,
        state: Arc<dyn StateStore>,
        recorder: Arc<dyn HistoryRecorder>,
        suspender: Suspender,
    ) -> Self {
        Self {
            target,
            interval,
            detector,
            state,
            recorder,
            suspender,
        }
    }

    /// Returns the repository this scheduler polls.
    pub fn target(&self) -> &RepositoryTarget {
        &self.target
    }

    /// Runs cycles until shutdown is requested.
    ///
    /// Transient failures skip to the next interval. A configuration error
    /// ends this target's loop and is returned; other targets are unaffected.
    pub async fn run(&self) -> Result<()> {
        loop {
            self.set_state(PollState::Idle);
            self.set_state(PollState::Waiting(self.interval));
            let waited = self
                .suspender
                .suspend(&self.target, WaitReason::Interval, self.interval)
                .await;
            if waited == WaitOutcome::Cancelled {
                info!(repo = %self.target, "Polling stopped");
                return Ok(());
            }

            if let CycleOutcome::Skipped(e) = self.run_cycle().await {
                if !e.is_transient() {
                    return Err(e);
                }
            }
        }
    }

    /// Runs one detect, record, advance cycle without waiting first.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = match self.cycle().await {
            Ok(outcome) => outcome,
            Err(e) => {
                match e.kind() {
                    ErrorKind::RateLimited | ErrorKind::RemoteUnavailable => {
                        warn!(repo = %self.target, error = %e, "Cycle skipped, retrying next interval");
                    }
                    ErrorKind::PersistenceFailure => {
                        error!(repo = %self.target, error = %e, "Recording failed, marker not advanced");
                    }
                    ErrorKind::ConfigurationError => {
                        error!(repo = %self.target, error = %e, "Stopping polling for repository");
                    }
                }
                CycleOutcome::Skipped(e)
            }
        };
        self.suspender.observer().on_cycle(&self.target, &outcome);
        outcome
    }

    async fn cycle(&self) -> Result<CycleOutcome> {
        self.set_state(PollState::Detecting);
        let last = self.state.read(&self.target)?;
        let Some(found) = self.detector.detect(&self.target, last.as_ref()).await? else {
            return Ok(CycleOutcome::NoChange);
        };

        self.set_state(PollState::Recording);
        let meta = self.detector.fetch_meta(&self.target).await?;
        let report = self.recorder.append(&self.target, &found, &meta)?;

        // Only reached once the append is durable.
        let marker = match self.state.write(&self.target, &found.marker, found.lineage)? {
            MarkerUpdate::Advanced | MarkerUpdate::Unchanged => found.marker,
            MarkerUpdate::Rejected => last.unwrap_or(found.marker),
        };
        info!(
            repo = %self.target,
            new_commits = report.new_commits,
            sha = short_sha(&marker.sha),
            "Recorded new commits"
        );
        Ok(CycleOutcome::Recorded {
            new_commits: report.new_commits,
            marker,
        })
    }

    fn set_state(&self, state: PollState) {
        self.suspender.observer().on_state(&self.target, &state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use tempfile::TempDir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::poll::{NoopObserver, PollObserver, RateLimiter};
    use crate::remote::mock::{commit, ScriptedRemote};
    use crate::repo::{CommitRecord, Lineage, NewCommits, RepoMeta};
    use crate::store::{AppendReport, FileStateStore, HistoryWriter, SnapshotStore};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn target() -> RepositoryTarget {
        RepositoryTarget::new("octocat", "Hello-World").unwrap()
    }

    struct Harness {
        scheduler: PollScheduler,
        remote: Arc<ScriptedRemote>,
        state: Arc<FileStateStore>,
        snapshots: SnapshotStore,
        cancel: CancellationToken,
        _dir: TempDir,
    }

    fn harness_with(
        remote: ScriptedRemote,
        recorder: Option<Arc<dyn HistoryRecorder>>,
        observer: Arc<dyn PollObserver>,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(remote);
        let state = Arc::new(FileStateStore::new(dir.path().join("state")));
        let snapshots = SnapshotStore::open_in_memory().unwrap();
        let recorder: Arc<dyn HistoryRecorder> = match recorder {
            Some(recorder) => recorder,
            None => Arc::new(HistoryWriter::new(snapshots.clone())),
        };
        let cancel = CancellationToken::new();
        let suspender = Suspender::new(cancel.clone(), observer);
        let detector = ChangeDetector::new(remote.clone(), RateLimiter::new(suspender.clone()));
        let scheduler = PollScheduler::new(
            target(),
            INTERVAL,
            detector,
            state.clone(),
            recorder,
            suspender,
        );
        Harness {
            scheduler,
            remote,
            state,
            snapshots,
            cancel,
            _dir: dir,
        }
    }

    fn harness(remote: ScriptedRemote) -> Harness {
        harness_with(remote, None, Arc::new(NoopObserver))
    }

    struct FullDisk;

    impl HistoryRecorder for FullDisk {
        fn append(
            &self,
            _target: &RepositoryTarget,
            _found: &NewCommits,
            _meta: &RepoMeta,
        ) -> Result<AppendReport> {
            Err(RoverError::PersistenceFailure("No space left on device".into()))
        }
    }

    #[derive(Default)]
    struct StateLog(Mutex<Vec<PollState>>);

    impl PollObserver for StateLog {
        fn on_state(&self, _target: &RepositoryTarget, state: &PollState) {
            self.0.lock().unwrap().push(*state);
        }
    }

    #[tokio::test]
    async fn first_cycle_records_everything_second_records_nothing() {
        let h = harness(ScriptedRemote::with_commits(3));

        let first = h.scheduler.run_cycle().await;
        assert_eq!(
            first,
            CycleOutcome::Recorded {
                new_commits: 3,
                marker: LastSeenMarker::from_commit(&commit(3)),
            }
        );
        assert_eq!(
            h.state.read(&target()).unwrap(),
            Some(LastSeenMarker::from_commit(&commit(3)))
        );

        let snapshots = h.snapshots.all().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].commits.len(), 3);
        assert_eq!(snapshots[0].meta.stars, 42);
        assert_eq!(snapshots[0].meta.latest_release.as_deref(), Some("v1.0"));

        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::NoChange);
        assert_eq!(h.snapshots.all().unwrap().len(), 1);
        assert_eq!(
            h.state.read(&target()).unwrap(),
            Some(LastSeenMarker::from_commit(&commit(3)))
        );
    }

    #[tokio::test]
    async fn failed_recording_keeps_previous_marker() {
        let h = harness_with(
            ScriptedRemote::with_commits(2),
            Some(Arc::new(FullDisk)),
            Arc::new(NoopObserver),
        );
        let before = LastSeenMarker::from_commit(&commit(1));
        h.state.write(&target(), &before, Lineage::Unknown).unwrap();

        let outcome = h.scheduler.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Skipped(RoverError::PersistenceFailure(_))
        ));
        assert_eq!(h.state.read(&target()).unwrap(), Some(before));
    }

    #[tokio::test]
    async fn marker_is_monotonic_across_cycles() {
        let h = harness(ScriptedRemote::with_commits(1));
        h.scheduler.run_cycle().await;
        let mut previous = h.state.read(&target()).unwrap().unwrap();

        for n in 2..=5 {
            h.remote.push_commit(commit(n));
            h.scheduler.run_cycle().await;
            let marker = h.state.read(&target()).unwrap().unwrap();
            assert!(marker.committed_at >= previous.committed_at);
            previous = marker;
        }

        // A force push back to an older commit is never recorded as the marker.
        h.remote.replace_history(vec![commit(1)]);
        h.scheduler.run_cycle().await;
        let marker = h.state.read(&target()).unwrap().unwrap();
        assert_eq!(marker, LastSeenMarker::from_commit(&commit(5)));
    }

    #[tokio::test]
    async fn rebased_head_with_older_author_date_advances_marker() {
        let h = harness(ScriptedRemote::with_commits(3));
        let calls = h.remote.calls();
        h.scheduler.run_cycle().await;

        let rebased = CommitRecord {
            sha: "f".repeat(40),
            ..commit(0)
        };
        h.remote.push_commit(rebased.clone());
        assert_eq!(
            h.scheduler.run_cycle().await,
            CycleOutcome::Recorded {
                new_commits: 1,
                marker: LastSeenMarker::from_commit(&rebased),
            }
        );
        assert_eq!(
            h.state.read(&target()).unwrap(),
            Some(LastSeenMarker::from_commit(&rebased))
        );

        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::NoChange);
        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::NoChange);
        assert_eq!(calls.list(), 2);
    }

    #[tokio::test]
    async fn unavailable_remote_skips_cycle_then_recovers() {
        let h = harness(ScriptedRemote::with_commits(2));
        h.remote
            .fail_next(RoverError::RemoteUnavailable("connection reset".into()));

        assert_eq!(
            h.scheduler.run_cycle().await,
            CycleOutcome::Skipped(RoverError::RemoteUnavailable("connection reset".into()))
        );
        assert_eq!(h.state.read(&target()).unwrap(), None);

        assert!(matches!(
            h.scheduler.run_cycle().await,
            CycleOutcome::Recorded { new_commits: 2, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_detection_waits_then_records() {
        let log = Arc::new(StateLog::default());
        let h = harness_with(ScriptedRemote::with_commits(1), None, log.clone());
        h.remote.fail_next(RoverError::RateLimited {
            retry_after: Duration::from_secs(5),
        });

        let start = Instant::now();
        let outcome = h.scheduler.run_cycle().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(matches!(outcome, CycleOutcome::Recorded { new_commits: 1, .. }));
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                PollState::Detecting,
                PollState::Backoff(Duration::from_secs(5)),
                PollState::Detecting,
                PollState::Recording,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_each_interval_until_cancelled() {
        let h = harness(ScriptedRemote::with_commits(2));
        let calls = h.remote.calls();
        let cancel = h.cancel.clone();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            cancel.cancel();
        });
        assert_eq!(h.scheduler.run().await, Ok(()));
        canceller.await.unwrap();

        // Cycles ran at 60s and 120s; shutdown interrupted the third wait.
        assert_eq!(calls.latest(), 2);
        assert_eq!(calls.list(), 1);
        assert_eq!(
            h.state.read(&target()).unwrap(),
            Some(LastSeenMarker::from_commit(&commit(2)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_error_ends_the_loop() {
        let h = harness(ScriptedRemote::with_commits(1));
        h.remote
            .fail_next(RoverError::ConfigurationError("bad credentials".into()));

        let result = h.scheduler.run().await;
        assert_eq!(
            result,
            Err(RoverError::ConfigurationError("bad credentials".into()))
        );
    }
}
