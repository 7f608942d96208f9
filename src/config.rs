//! `rover.yaml` configuration.
//!
//! ```yaml
//! repositories:
//!   - https://github.com/octocat/Hello-World
//!   - rust-lang/rust
//! interval_minutes: 60
//! github_token: ${GITHUB_TOKEN}
//! data_dir: ./rover-data
//! logs:
//!   combined_log_file: combined.log
//!   html: true
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RoverError;
use crate::remote::github::DEFAULT_API_URL;
use crate::remote::GitHubClientConfig;
use crate::repo::RepositoryTarget;
use crate::utils::settings;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rover.yaml";

/// Environment variables consulted for a token when the file has none.
pub const TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

const DEFAULT_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_MAX_COMMIT_PAGES: u32 = 10;

/// Loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository references, one per polling loop.
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Minutes between polls of each repository.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Bearer token for the GitHub API, after `${VAR}` expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Root for log folders, marker state, and the snapshot database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Rendered log options.
    #[serde(default)]
    pub logs: LogsConfig,

    /// Upper bound on commit pages (100 commits each) fetched per cycle.
    #[serde(default = "default_max_commit_pages")]
    pub max_commit_pages: u32,
}

/// Rendered log options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    /// Log shared by all repositories; relative paths are under `data_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_log_file: Option<PathBuf>,

    /// Whether to render `<name>_log.html` per repository.
    #[serde(default = "default_true")]
    pub html: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            combined_log_file: None,
            html: true,
        }
    }
}

fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_commit_pages() -> u32 {
    DEFAULT_MAX_COMMIT_PAGES
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Loads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parses and validates configuration YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_yaml::from_str(content).context("Failed to parse configuration YAML")?;

        if config.interval_minutes == 0 {
            bail!("interval_minutes must be greater than zero");
        }
        if config.max_commit_pages == 0 {
            bail!("max_commit_pages must be greater than zero");
        }
        config.github_token = match config.github_token.take() {
            Some(raw) => Some(expand_env(&raw)?).filter(|token| !token.is_empty()),
            None => None,
        };
        Ok(config)
    }

    /// Returns the poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Parses every configured repository, keeping failures per entry.
    pub fn targets(&self) -> Vec<(&str, Result<RepositoryTarget, RoverError>)> {
        self.repositories
            .iter()
            .map(|raw| (raw.as_str(), RepositoryTarget::parse(raw)))
            .collect()
    }

    /// Returns the configured token, else the first of [`TOKEN_ENV_VARS`] that is set.
    pub fn resolve_token(&self) -> Option<String> {
        self.github_token
            .clone()
            .or_else(|| settings::get_env_vars(TOKEN_ENV_VARS).ok())
    }

    /// Returns the GitHub client settings.
    pub fn client_config(&self) -> GitHubClientConfig {
        GitHubClientConfig {
            token: self.resolve_token(),
            api_url: self.api_url.clone(),
            max_pages: self.max_commit_pages,
        }
    }

    /// Directory holding one marker file per repository.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Path of the snapshot database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("repository_data.db")
    }

    /// Path of the combined log, if enabled.
    pub fn combined_log_path(&self) -> Option<PathBuf> {
        self.logs
            .combined_log_file
            .as_ref()
            .map(|path| self.data_dir.join(path))
    }

    /// Returns the configuration as YAML with the token masked.
    pub fn redacted(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.github_token = shown.github_token.as_deref().map(mask);
        serde_yaml::to_string(&shown).context("Failed to serialize configuration")
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.redacted() {
            Ok(yaml) => f.write_str(&yaml),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Replaces every character of a secret with `*`.
pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

/// Expands `${VAR}` placeholders from the environment or the settings file.
fn expand_env(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!("Unterminated '${{' in value: {raw}");
        };
        let name = &after[..end];
        if name.is_empty() {
            bail!("Empty variable name in value: {raw}");
        }
        let value = settings::get_env_var(name)
            .with_context(|| format!("Unresolved variable '{name}' in configuration"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
