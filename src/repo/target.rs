//! Repository targets parsed from configured URLs.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RoverError};

const GITHUB_HOST: &str = "github.com";

/// A remote repository to poll, identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryTarget {
    /// Account or organization that owns the repository.
    pub owner: String,
    /// Repository name without any `.git` suffix.
    pub name: String,
    /// Canonical web URL, `https://github.com/<owner>/<name>`.
    pub url: String,
}

impl RepositoryTarget {
    /// Creates a target from an owner and repository name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        validate_segment(&owner, "owner")?;
        validate_segment(&name, "repository name")?;
        let url = format!("https://{GITHUB_HOST}/{owner}/{name}");
        Ok(Self { owner, name, url })
    }

    /// Parses a configured repository reference.
    ///
    /// Accepts HTTPS URLs (`https://github.com/owner/name[.git]`), SSH remotes
    /// (`git@github.com:owner/name.git`), and the bare `owner/name` shorthand.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RoverError::ConfigurationError(
                "Empty repository reference".to_string(),
            ));
        }

        let path = if let Some(rest) = input.strip_prefix("git@github.com:") {
            rest.to_string()
        } else if input.contains("://") {
            let url = Url::parse(input).map_err(|e| {
                RoverError::ConfigurationError(format!("Invalid repository URL '{input}': {e}"))
            })?;
            match url.host_str() {
                Some(host) if host.eq_ignore_ascii_case(GITHUB_HOST) => {}
                _ => {
                    return Err(RoverError::ConfigurationError(format!(
                        "Not a GitHub repository URL: {input}"
                    )))
                }
            }
            url.path().to_string()
        } else {
            input.to_string()
        };

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            [owner, name] => Self::new(*owner, *name),
            _ => Err(RoverError::ConfigurationError(format!(
                "Expected 'owner/name' repository, got: {input}"
            ))),
        }
    }

    /// Returns the `owner/name` key used for persisted state.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Returns the lowercased `owner/name`.
    ///
    /// GitHub resolves owners and names case-insensitively, so two targets with
    /// the same identity are the same repository.
    pub fn identity(&self) -> String {
        self.key().to_ascii_lowercase()
    }

    /// Returns a filesystem-safe identifier, `owner__name`.
    pub fn slug(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn validate_segment(segment: &str, label: &str) -> Result<()> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RoverError::ConfigurationError(format!(
            "Invalid {label}: '{segment}'"
        )))
    }
}
