//! Configuration-related CLI commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{mask, Config, TOKEN_ENV_VARS};
use crate::utils::settings;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the loaded configuration with the token masked.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self, config: &Config) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(config),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self, config: &Config) -> Result<()> {
        print!("{}", config.redacted()?);
        if config.github_token.is_none() {
            match settings::get_env_vars(TOKEN_ENV_VARS) {
                Ok(token) => println!("# github_token from environment: {}", mask(&token)),
                Err(_) => println!("# no github_token; requests are unauthenticated"),
            }
        }
        Ok(())
    }
}
