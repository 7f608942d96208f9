//! Commit records and the last-seen marker derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single commit as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit sha; unique per commit.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Author login, or the author name when the commit has no linked account.
    pub author: String,
    /// Author timestamp.
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    /// Returns the first line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// How far a repository has been processed.
///
/// Change detection compares `sha`. `committed_at` guards against moving the
/// marker backwards in time when the remote history no longer contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeenMarker {
    /// Sha of the most recently processed commit.
    pub sha: String,
    /// Author timestamp of that commit.
    pub committed_at: DateTime<Utc>,
}

impl LastSeenMarker {
    /// Creates a marker pointing at the given commit.
    pub fn from_commit(commit: &CommitRecord) -> Self {
        Self {
            sha: commit.sha.clone(),
            committed_at: commit.timestamp,
        }
    }

    /// Returns true if both markers identify the same commit.
    pub fn same_commit(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

/// How a new marker relates to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    /// The stored commit was found in the history behind the new head.
    Descendant,
    /// There was no stored marker, or its commit is no longer in the listed history.
    Unknown,
}

/// Result of a detection that found new commit activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommits {
    /// Commits newer than the last-seen marker, newest first.
    pub commits: Vec<CommitRecord>,
    /// Marker for the newest commit in `commits`.
    pub marker: LastSeenMarker,
    /// Whether the remote history still contains the previous marker.
    pub lineage: Lineage,
}
