//! Settings file fallback for environment variables.
//!
//! Values are read from `$HOME/.repo-rover/settings.json` when the process
//! environment does not define them:
//!
//! ```json
//! { "env": { "GITHUB_TOKEN": "ghp_..." } }
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Settings loaded from `$HOME/.repo-rover/settings.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable fallbacks.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::default_path()?)
    }

    /// Loads settings from `path`; a missing file yields empty settings.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns `$HOME/.repo-rover/settings.json`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(".repo-rover").join("settings.json"))
    }

    /// Returns `key` from the environment, falling back to these settings.
    ///
    /// Empty values count as unset.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .or_else(|| self.env.get(key).filter(|v| !v.is_empty()).cloned())
    }
}

/// Returns `key` from the environment, falling back to the settings file.
pub fn get_env_var(key: &str) -> Result<String> {
    if let Some(value) = env::var(key).ok().filter(|v| !v.is_empty()) {
        return Ok(value);
    }
    let settings = Settings::load()?;
    settings
        .env
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("Environment variable not found: {key}"))
}

/// Returns the first of `keys` that is set, in order.
pub fn get_env_vars(keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|key| get_env_var(key).ok())
        .ok_or_else(|| anyhow!("None of the environment variables found: {keys:?}"))
}
