//! Point-in-time repository snapshots stored for historical tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommitRecord, LastSeenMarker, RepositoryTarget};

/// Repository metadata fetched alongside new commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMeta {
    /// Stargazer count.
    pub stars: u64,
    /// Fork count.
    pub forks: u64,
    /// Repository description, if set.
    pub description: Option<String>,
    /// Tag of the latest published release, if any.
    pub latest_release: Option<String>,
}

/// One row of the append-only snapshot history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    /// Repository the snapshot belongs to.
    pub target: RepositoryTarget,
    /// Marker detected by the cycle that produced this snapshot.
    pub marker: LastSeenMarker,
    /// Metadata at the time of the cycle.
    pub meta: RepoMeta,
    /// Commits first recorded by this cycle, newest first.
    pub commits: Vec<CommitRecord>,
    /// When the snapshot was written.
    pub recorded_at: DateTime<Utc>,
}
