//! Per-repository last-seen markers that survive restarts.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, RoverError};
use crate::repo::{short_sha, LastSeenMarker, Lineage, RepositoryTarget};

/// Outcome of [`StateStore::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerUpdate {
    /// The marker moved to a new commit.
    Advanced,
    /// The stored marker already pointed at this commit.
    Unchanged,
    /// The new commit is older than the stored one and not known to descend
    /// from it; the stored marker was kept.
    Rejected,
}

/// Durable store of one [`LastSeenMarker`] per repository.
///
/// Markers never move backwards in time; only [`StateStore::reset`] clears them.
/// A head whose history still contains the stored commit is always a move
/// forward, whatever its timestamp says.
pub trait StateStore: Send + Sync {
    /// Returns the stored marker, or `None` if the repository was never processed.
    fn read(&self, target: &RepositoryTarget) -> Result<Option<LastSeenMarker>>;

    /// Durably stores `marker`; the write is on disk when this returns.
    fn write(
        &self,
        target: &RepositoryTarget,
        marker: &LastSeenMarker,
        lineage: Lineage,
    ) -> Result<MarkerUpdate>;

    /// Removes the stored marker. Returns false if there was none.
    fn reset(&self, target: &RepositoryTarget) -> Result<bool>;
}

/// On-disk marker record.
#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    repo: String,
    #[serde(flatten)]
    marker: LastSeenMarker,
    updated_at: DateTime<Utc>,
}

/// [`StateStore`] keeping one JSON file per repository in a directory.
///
/// Files are replaced atomically (temp file, fsync, rename), so separate
/// repositories never contend for a shared lock.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Creates a store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory markers are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(&self, target: &RepositoryTarget) -> PathBuf {
        self.dir
            .join(format!("{}.json", target.identity().replace('/', "__")))
    }

    fn persist(&self, path: &Path, record: &MarkerFile) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| RoverError::persistence("create state directory", e))?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| RoverError::persistence("serialize marker", e))?;
        let mut file = NamedTempFile::new_in(&self.dir)
            .map_err(|e| RoverError::persistence("create marker temp file", e))?;
        file.write_all(&json)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| RoverError::persistence("write marker", e))?;
        file.persist(path)
            .map_err(|e| RoverError::persistence("replace marker file", e.error))?;

        sync_dir(&self.dir)
    }
}

impl StateStore for FileStateStore {
    fn read(&self, target: &RepositoryTarget) -> Result<Option<LastSeenMarker>> {
        let path = self.marker_path(target);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RoverError::persistence(
                    &format!("read marker {}", path.display()),
                    e,
                ))
            }
        };

        let record: MarkerFile = serde_json::from_str(&content).map_err(|e| {
            RoverError::persistence(&format!("parse marker {}", path.display()), e)
        })?;
        Ok(Some(record.marker))
    }

    fn write(
        &self,
        target: &RepositoryTarget,
        marker: &LastSeenMarker,
        lineage: Lineage,
    ) -> Result<MarkerUpdate> {
        if let Some(current) = self.read(target)? {
            if current.same_commit(marker) {
                return Ok(MarkerUpdate::Unchanged);
            }
            // Author dates are not ordered along a branch; rebased or
            // cherry-picked heads often carry an earlier one.
            if lineage == Lineage::Unknown && marker.committed_at < current.committed_at {
                warn!(
                    repo = %target,
                    stored = short_sha(&current.sha),
                    rejected = short_sha(&marker.sha),
                    "Refusing to move marker to an older commit"
                );
                return Ok(MarkerUpdate::Rejected);
            }
        }

        let record = MarkerFile {
            repo: target.key(),
            marker: marker.clone(),
            updated_at: Utc::now(),
        };
        self.persist(&self.marker_path(target), &record)?;
        debug!(repo = %target, sha = short_sha(&marker.sha), "Marker advanced");
        Ok(MarkerUpdate::Advanced)
    }

    fn reset(&self, target: &RepositoryTarget) -> Result<bool> {
        match fs::remove_file(self.marker_path(target)) {
            Ok(()) => {
                sync_dir(&self.dir)?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RoverError::persistence("remove marker", e)),
        }
    }
}

/// Flushes directory entries so a rename or unlink survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| RoverError::persistence("sync state directory", e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
