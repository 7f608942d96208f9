//! Remote repository API boundary.
//!
//! The polling core only talks to a [`RemoteClient`]. [`GitHubClient`] is the
//! production implementation; tests substitute a scripted client.

pub mod github;
#[cfg(test)]
pub(crate) mod mock;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::repo::{CommitRecord, RepoMeta, RepositoryTarget};

pub use github::{GitHubClient, GitHubClientConfig};

/// Boxed future returned by [`RemoteClient`] methods.
pub type RemoteFuture<'a, T> = BoxFuture<'a, Result<T>>;

/// Commits returned by [`RemoteClient::list_commits`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitListing {
    /// Commits newer than `since`, newest first.
    pub commits: Vec<CommitRecord>,
    /// Whether the listing reached the `since` commit.
    pub found_since: bool,
    /// Whether the page limit ended the listing before `since` or the root.
    pub truncated: bool,
}

/// Read access to a remote repository host.
///
/// Implementations map throttling to [`RoverError::RateLimited`] and every
/// other network or authentication failure to [`RoverError::RemoteUnavailable`].
///
/// [`RoverError::RateLimited`]: crate::error::RoverError::RateLimited
/// [`RoverError::RemoteUnavailable`]: crate::error::RoverError::RemoteUnavailable
pub trait RemoteClient: Send + Sync {
    /// Returns the newest commit on the default branch, or `None` for an empty repository.
    fn latest_commit<'a>(
        &'a self,
        target: &'a RepositoryTarget,
    ) -> RemoteFuture<'a, Option<CommitRecord>>;

    /// Lists the default branch newest first, stopping before `since`.
    ///
    /// With `since` unset, or absent from the history, the whole history is
    /// listed up to the client's page limit.
    fn list_commits<'a>(
        &'a self,
        target: &'a RepositoryTarget,
        since: Option<&'a str>,
    ) -> RemoteFuture<'a, CommitListing>;

    /// Returns popularity and release metadata for the repository.
    fn repo_meta<'a>(&'a self, target: &'a RepositoryTarget) -> RemoteFuture<'a, RepoMeta>;
}
