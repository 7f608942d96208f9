//! Snapshot history listing.

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::repo::{short_sha, RepositorySnapshot, RepositoryTarget};
use crate::store::SnapshotStore;

/// Lists stored snapshots, oldest first.
#[derive(Parser)]
pub struct HistoryCommand {
    /// Only show this repository (`owner/name` or URL).
    pub repository: Option<String>,

    /// Print snapshots as JSON.
    #[arg(long)]
    pub json: bool,

    /// Also list the commits of each snapshot.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl HistoryCommand {
    /// Executes the history command.
    pub fn execute(self, config: &Config) -> Result<()> {
        let path = config.database_path();
        if !path.exists() {
            println!("No history recorded yet ({} not found)", path.display());
            return Ok(());
        }

        let store = SnapshotStore::open(&path)?;
        let snapshots = match &self.repository {
            Some(raw) => {
                let target = RepositoryTarget::parse(raw)
                    .with_context(|| format!("Invalid repository: {raw}"))?;
                store.for_target(&target)?
            }
            None => store.all()?,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshots).context("Failed to serialize history")?
            );
            return Ok(());
        }

        if snapshots.is_empty() {
            println!("No snapshots recorded");
        }
        for snapshot in &snapshots {
            println!("{}", format_snapshot(snapshot));
            if self.verbose {
                for commit in &snapshot.commits {
                    println!(
                        "    {} {} {}",
                        short_sha(&commit.sha),
                        commit.author,
                        commit.summary()
                    );
                }
            }
        }
        Ok(())
    }
}

fn format_snapshot(snapshot: &RepositorySnapshot) -> String {
    format!(
        "{}  {}  {}  stars={} forks={} release={}  {} new commit(s)",
        snapshot.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        snapshot.target,
        short_sha(&snapshot.marker.sha),
        snapshot.meta.stars,
        snapshot.meta.forks,
        snapshot.meta.latest_release.as_deref().unwrap_or("-"),
        snapshot.commits.len()
    )
}
