//! Change detection against the last-seen marker.

use std::sync::Arc;

use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use crate::error::Result;
use crate::remote::RemoteClient;
use crate::repo::{short_sha, LastSeenMarker, Lineage, NewCommits, RepoMeta, RepositoryTarget};

/// Decides whether a repository has commits beyond its last-seen marker.
///
/// All remote calls go through the [`RateLimiter`].
#[derive(Clone)]
pub struct ChangeDetector {
    remote: Arc<dyn RemoteClient>,
    limiter: RateLimiter,
}

impl ChangeDetector {
    /// Creates a detector over a remote client.
    pub fn new(remote: Arc<dyn RemoteClient>, limiter: RateLimiter) -> Self {
        Self { remote, limiter }
    }

    /// Returns the new commits and marker, or `None` when nothing changed.
    ///
    /// Only the remote head is fetched when it matches `last`. When the head
    /// moved, history is listed back to the `last` commit.
    pub async fn detect(
        &self,
        target: &RepositoryTarget,
        last: Option<&LastSeenMarker>,
    ) -> Result<Option<NewCommits>> {
        let head = self
            .limiter
            .call(target, || self.remote.latest_commit(target))
            .await?;

        let Some(head) = head else {
            debug!(repo = %target, "Remote repository has no commits");
            return Ok(None);
        };

        let head_marker = LastSeenMarker::from_commit(&head);
        if last.is_some_and(|marker| marker.same_commit(&head_marker)) {
            debug!(repo = %target, sha = short_sha(&head.sha), "No new commits");
            return Ok(None);
        }

        let since = last.map(|marker| marker.sha.as_str());
        let listing = self
            .limiter
            .call(target, || self.remote.list_commits(target, since))
            .await?;

        // The head can vanish between the two calls after a force push.
        let Some(newest) = listing.commits.first() else {
            return Ok(None);
        };
        let marker = LastSeenMarker::from_commit(newest);
        let lineage = if listing.found_since {
            Lineage::Descendant
        } else {
            if let Some(since) = since {
                warn!(
                    repo = %target,
                    last_seen = short_sha(since),
                    truncated = listing.truncated,
                    "Last-seen commit not found in remote history"
                );
            }
            Lineage::Unknown
        };

        debug!(
            repo = %target,
            sha = short_sha(&marker.sha),
            listed = listing.commits.len(),
            ?lineage,
            "Detected new commits"
        );
        Ok(Some(NewCommits {
            commits: listing.commits,
            marker,
            lineage,
        }))
    }

    /// Fetches repository metadata through the rate limiter.
    pub async fn fetch_meta(&self, target: &RepositoryTarget) -> Result<RepoMeta> {
        self.limiter
            .call(target, || self.remote.repo_meta(target))
            .await
    }
}
