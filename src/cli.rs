//! CLI interface for repo-rover.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{Config, DEFAULT_CONFIG_FILE};

pub mod config;
pub mod console;
pub mod history;
pub mod reset;
pub mod watch;

/// repo-rover: polls repositories and records new commits.
#[derive(Parser)]
#[command(name = "repo-rover")]
#[command(about = "Polls GitHub repositories and records new commits", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short = 'c', global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Polls every configured repository until interrupted.
    Watch(watch::WatchCommand),
    /// Lists recorded repository snapshots.
    History(history::HistoryCommand),
    /// Configuration inspection.
    Config(config::ConfigCommand),
    /// Clears the last-seen marker of a repository.
    Reset(reset::ResetCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(&self.config)?;
        match self.command {
            Commands::Watch(cmd) => cmd.execute(&config).await,
            Commands::History(cmd) => cmd.execute(&config),
            Commands::Config(cmd) => cmd.execute(&config),
            Commands::Reset(cmd) => cmd.execute(&config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_once_with_config() {
        let cli = Cli::try_parse_from(["repo-rover", "--config", "other.yaml", "watch", "--once"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(matches!(cli.command, Commands::Watch(ref w) if w.once));
    }

    #[test]
    fn config_defaults_to_rover_yaml() {
        let cli = Cli::try_parse_from(["repo-rover", "reset", "octocat/Hello-World"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("rover.yaml"));
    }

    #[test]
    fn reset_requires_repository() {
        assert!(Cli::try_parse_from(["repo-rover", "reset"]).is_err());
    }
}
