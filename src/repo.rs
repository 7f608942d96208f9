//! Repository data model: targets, commits, markers, and snapshots.

pub mod commit;
pub mod snapshot;
pub mod target;

pub use commit::{CommitRecord, LastSeenMarker, Lineage, NewCommits};
pub use snapshot::{RepoMeta, RepositorySnapshot};
pub use target::RepositoryTarget;

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_SHA_LEN: usize = 8;

/// Returns the abbreviated form of a commit sha.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}
