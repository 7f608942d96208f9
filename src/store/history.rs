//! Append-only, idempotent commit history.

use tracing::{debug, error};

use super::database::SnapshotStore;
use super::log_sink::LogSink;
use crate::error::{Result, RoverError};
use crate::repo::{NewCommits, RepoMeta, RepositoryTarget};

/// Result of a successful [`HistoryRecorder::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendReport {
    /// Commits stored for the first time by this append.
    pub new_commits: usize,
}

/// Durable history of detected commits.
///
/// Appending a sha already recorded for the same repository must not create a
/// second entry, so a cycle replayed after a crash is harmless.
pub trait HistoryRecorder: Send + Sync {
    /// Records `found` for `target`. Any sink failure fails the whole append.
    fn append(
        &self,
        target: &RepositoryTarget,
        found: &NewCommits,
        meta: &RepoMeta,
    ) -> Result<AppendReport>;
}

/// [`HistoryRecorder`] writing the rendered logs first and the snapshot table last.
pub struct HistoryWriter {
    sinks: Vec<Box<dyn LogSink>>,
    snapshots: SnapshotStore,
}

impl HistoryWriter {
    /// Creates a writer over the snapshot table with no log sinks.
    pub fn new(snapshots: SnapshotStore) -> Self {
        Self {
            sinks: Vec::new(),
            snapshots,
        }
    }

    /// Adds a log sink, written before the snapshot table.
    #[must_use]
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Returns the snapshot table.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

impl HistoryRecorder for HistoryWriter {
    fn append(
        &self,
        target: &RepositoryTarget,
        found: &NewCommits,
        meta: &RepoMeta,
    ) -> Result<AppendReport> {
        for sink in &self.sinks {
            sink.write(target, &found.commits).map_err(|e| {
                error!(repo = %target, sink = sink.name(), error = %e, "Failed to write log");
                if matches!(e, RoverError::PersistenceFailure(_)) {
                    e
                } else {
                    RoverError::persistence(sink.name(), e)
                }
            })?;
        }

        let stored = self
            .snapshots
            .append(target, &found.marker, meta, &found.commits)
            .map_err(|e| {
                error!(repo = %target, error = %e, "Failed to store snapshot");
                e
            })?;

        let new_commits = stored.map_or(0, |snapshot| snapshot.commits.len());
        debug!(repo = %target, new_commits, "History appended");
        Ok(AppendReport { new_commits })
    }
}

impl std::fmt::Debug for HistoryWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryWriter")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
