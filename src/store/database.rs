//! SQLite snapshot history.
//!
//! The `repositories` table is an append-only log of [`RepositorySnapshot`]
//! rows. `recorded_commits` keys every stored commit by `(repo_url, sha)`, which
//! makes appends idempotent: a commit already recorded for a repository is
//! never written into a second snapshot. Repository URLs compare without
//! regard to case, as GitHub resolves them.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, RoverError};
use crate::repo::{CommitRecord, LastSeenMarker, RepoMeta, RepositorySnapshot, RepositoryTarget};

/// A schema migration applied exactly once, in version order.
struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r"
            CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo_url TEXT NOT NULL,
                last_commit_date TEXT NOT NULL,
                stars INTEGER NOT NULL,
                forks INTEGER NOT NULL,
                latest_release TEXT,
                description TEXT,
                commit_history TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        sql: r"
            ALTER TABLE repositories ADD COLUMN last_commit_sha TEXT NOT NULL DEFAULT '';
            ALTER TABLE repositories ADD COLUMN recorded_at TEXT NOT NULL DEFAULT '';
            CREATE INDEX IF NOT EXISTS idx_repositories_repo_url ON repositories(repo_url);
            CREATE TABLE IF NOT EXISTS recorded_commits (
                repo_url TEXT NOT NULL,
                sha TEXT NOT NULL,
                snapshot_id INTEGER NOT NULL REFERENCES repositories(id),
                PRIMARY KEY (repo_url, sha)
            );
        ",
    },
];

/// Append-only store of repository snapshots, shared by all polling loops.
///
/// Each append runs in a single transaction under the connection lock, so
/// concurrent loops never interleave partial writes.
#[derive(Clone)]
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RoverError::persistence("create database directory", e))?;
            }
        }
        let conn = Connection::open(path)?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode, "Opened snapshot database");
        conn.execute_batch(
            "PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RoverError::PersistenceFailure("snapshot database lock poisoned".into()))
    }

    /// Appends a snapshot holding the commits not yet recorded for `target`.
    ///
    /// Returns `None`, writing nothing, when every commit was already recorded.
    pub fn append(
        &self,
        target: &RepositoryTarget,
        marker: &LastSeenMarker,
        meta: &RepoMeta,
        commits: &[CommitRecord],
    ) -> Result<Option<RepositorySnapshot>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut fresh = Vec::new();
        let mut seen = HashSet::new();
        {
            let mut exists = tx.prepare(
                "SELECT 1 FROM recorded_commits
                 WHERE repo_url = ?1 COLLATE NOCASE AND sha = ?2",
            )?;
            for commit in commits {
                if !seen.insert(commit.sha.as_str()) {
                    continue;
                }
                let known = exists
                    .query_row(params![target.url, commit.sha], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !known {
                    fresh.push(commit.clone());
                }
            }
        }

        if fresh.is_empty() {
            return Ok(None);
        }

        let recorded_at = Utc::now();
        let history = serde_json::to_string(&fresh)
            .map_err(|e| RoverError::persistence("serialize commit history", e))?;
        tx.execute(
            "INSERT INTO repositories
                 (repo_url, last_commit_date, stars, forks, latest_release, description,
                  commit_history, last_commit_sha, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                target.url,
                marker.committed_at.to_rfc3339(),
                i64::try_from(meta.stars).unwrap_or(i64::MAX),
                i64::try_from(meta.forks).unwrap_or(i64::MAX),
                meta.latest_release,
                meta.description,
                history,
                marker.sha,
                recorded_at.to_rfc3339(),
            ],
        )?;
        let snapshot_id = tx.last_insert_rowid();
        {
            let mut insert = tx.prepare(
                "INSERT INTO recorded_commits (repo_url, sha, snapshot_id) VALUES (?1, ?2, ?3)",
            )?;
            for commit in &fresh {
                insert.execute(params![target.url, commit.sha, snapshot_id])?;
            }
        }
        tx.commit()?;

        Ok(Some(RepositorySnapshot {
            target: target.clone(),
            marker: marker.clone(),
            meta: meta.clone(),
            commits: fresh,
            recorded_at,
        }))
    }

    /// Returns every stored snapshot in insertion order.
    pub fn all(&self) -> Result<Vec<RepositorySnapshot>> {
        self.query_snapshots(None)
    }

    /// Returns the snapshots of one repository in insertion order.
    pub fn for_target(&self, target: &RepositoryTarget) -> Result<Vec<RepositorySnapshot>> {
        self.query_snapshots(Some(&target.url))
    }

    /// Returns the shas recorded for `target`.
    pub fn recorded_shas(&self, target: &RepositoryTarget) -> Result<HashSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT sha FROM recorded_commits WHERE repo_url = ?1 COLLATE NOCASE")?;
        let shas = stmt
            .query_map(params![target.url], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(shas)
    }

    fn query_snapshots(&self, repo_url: Option<&str>) -> Result<Vec<RepositorySnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT repo_url, last_commit_date, stars, forks, latest_release, description,
                    commit_history, last_commit_sha, recorded_at
             FROM repositories
             WHERE ?1 IS NULL OR repo_url = ?1 COLLATE NOCASE
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![repo_url], |row| {
                Ok(SnapshotRow {
                    repo_url: row.get(0)?,
                    last_commit_date: row.get(1)?,
                    stars: row.get(2)?,
                    forks: row.get(3)?,
                    latest_release: row.get(4)?,
                    description: row.get(5)?,
                    commit_history: row.get(6)?,
                    last_commit_sha: row.get(7)?,
                    recorded_at: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}

struct SnapshotRow {
    repo_url: String,
    last_commit_date: String,
    stars: i64,
    forks: i64,
    latest_release: Option<String>,
    description: Option<String>,
    commit_history: String,
    last_commit_sha: String,
    recorded_at: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<RepositorySnapshot> {
        let commits: Vec<CommitRecord> = serde_json::from_str(&self.commit_history)
            .map_err(|e| RoverError::persistence("parse commit history", e))?;
        Ok(RepositorySnapshot {
            target: RepositoryTarget::parse(&self.repo_url)
                .map_err(|e| RoverError::persistence("parse stored repo_url", e))?,
            marker: LastSeenMarker {
                sha: self.last_commit_sha,
                committed_at: parse_timestamp(&self.last_commit_date)?,
            },
            meta: RepoMeta {
                stars: u64::try_from(self.stars).unwrap_or_default(),
                forks: u64::try_from(self.forks).unwrap_or_default(),
                description: self.description,
                latest_release: self.latest_release,
            },
            commits,
            recorded_at: parse_timestamp(&self.recorded_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RoverError::persistence(&format!("parse timestamp '{raw}'"), e))
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;
    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(version = migration.version, "Applied snapshot schema migration");
    }
    Ok(())
}
