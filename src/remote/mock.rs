//! Scripted remote used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{CommitListing, RemoteClient, RemoteFuture};
use crate::error::RoverError;
use crate::repo::{CommitRecord, RepoMeta, RepositoryTarget};

/// Builds a deterministic commit whose timestamp grows with `n`.
pub(crate) fn commit(n: u32) -> CommitRecord {
    CommitRecord {
        sha: format!("{n:040x}"),
        message: format!("Commit number {n}\n\nBody of commit {n}"),
        author: "octocat".to_string(),
        timestamp: base_time() + Duration::minutes(i64::from(n)),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Remote whose history can be changed between cycles and whose next calls
/// can be made to fail.
///
/// Failures are consumed in FIFO order by whichever call comes next.
pub(crate) struct ScriptedRemote {
    state: Arc<Mutex<RemoteState>>,
    calls: Arc<CallCounts>,
}

#[derive(Default)]
struct RemoteState {
    /// Newest first.
    commits: Vec<CommitRecord>,
    meta: RepoMeta,
    failures: VecDeque<RoverError>,
}

#[derive(Default)]
pub(crate) struct CallCounts {
    pub(crate) latest: AtomicUsize,
    pub(crate) list: AtomicUsize,
    pub(crate) meta: AtomicUsize,
}

impl CallCounts {
    pub(crate) fn latest(&self) -> usize {
        self.latest.load(Ordering::SeqCst)
    }

    pub(crate) fn list(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }
}

impl ScriptedRemote {
    /// Creates a remote holding commits `1..=count`.
    pub(crate) fn with_commits(count: u32) -> Self {
        let remote = Self {
            state: Arc::new(Mutex::new(RemoteState {
                meta: RepoMeta {
                    stars: 42,
                    forks: 7,
                    description: Some("My first repository on GitHub!".to_string()),
                    latest_release: Some("v1.0".to_string()),
                },
                ..RemoteState::default()
            })),
            calls: Arc::new(CallCounts::default()),
        };
        for n in 1..=count {
            remote.push_commit(commit(n));
        }
        remote
    }

    /// Adds a commit as the new head.
    pub(crate) fn push_commit(&self, commit: CommitRecord) {
        self.state.lock().unwrap().commits.insert(0, commit);
    }

    /// Replaces the whole history, as a force push would. `commits` is newest first.
    pub(crate) fn replace_history(&self, commits: Vec<CommitRecord>) {
        self.state.lock().unwrap().commits = commits;
    }

    /// Makes the next remote call fail with `err`.
    pub(crate) fn fail_next(&self, err: RoverError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    /// Returns a handle for inspecting call counts after the remote is shared.
    pub(crate) fn calls(&self) -> Arc<CallCounts> {
        self.calls.clone()
    }

    fn next_failure(&self) -> Option<RoverError> {
        self.state.lock().unwrap().failures.pop_front()
    }
}

impl RemoteClient for ScriptedRemote {
    fn latest_commit<'a>(
        &'a self,
        _target: &'a RepositoryTarget,
    ) -> RemoteFuture<'a, Option<CommitRecord>> {
        Box::pin(async move {
            self.calls.latest.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.next_failure() {
                return Err(err);
            }
            Ok(self.state.lock().unwrap().commits.first().cloned())
        })
    }

    fn list_commits<'a>(
        &'a self,
        _target: &'a RepositoryTarget,
        since: Option<&'a str>,
    ) -> RemoteFuture<'a, CommitListing> {
        Box::pin(async move {
            self.calls.list.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.next_failure() {
                return Err(err);
            }
            let state = self.state.lock().unwrap();
            let mut listing = CommitListing::default();
            for commit in &state.commits {
                if since == Some(commit.sha.as_str()) {
                    listing.found_since = true;
                    break;
                }
                listing.commits.push(commit.clone());
            }
            Ok(listing)
        })
    }

    fn repo_meta<'a>(&'a self, _target: &'a RepositoryTarget) -> RemoteFuture<'a, RepoMeta> {
        Box::pin(async move {
            self.calls.meta.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.next_failure() {
                return Err(err);
            }
            Ok(self.state.lock().unwrap().meta.clone())
        })
    }
}
