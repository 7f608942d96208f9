//! Marker reset command.

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::repo::RepositoryTarget;
use crate::store::{FileStateStore, StateStore};

/// Clears a repository's last-seen marker so the next cycle re-reads its history.
///
/// Recorded history is kept; commits already stored are not duplicated.
#[derive(Parser)]
pub struct ResetCommand {
    /// Repository as `owner/name` or a GitHub URL.
    pub repository: String,
}

impl ResetCommand {
    /// Executes the reset command.
    pub fn execute(self, config: &Config) -> Result<()> {
        let target = RepositoryTarget::parse(&self.repository)
            .with_context(|| format!("Invalid repository: {}", self.repository))?;
        let store = FileStateStore::new(config.state_dir());

        if store.reset(&target)? {
            println!("Cleared marker for {target}");
        } else {
            println!("No marker stored for {target}");
        }
        Ok(())
    }
}
