//! GitHub REST API client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{CommitListing, RemoteClient, RemoteFuture};
use crate::error::{Result, RoverError};
use crate::repo::{CommitRecord, RepoMeta, RepositoryTarget};

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Wait used when a rate-limited response carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// HTTP request timeout for GitHub API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Commits requested per page when listing history.
const COMMITS_PER_PAGE: u32 = 100;

/// Settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// Bearer token; passed through without inspection.
    pub token: Option<String>,
    /// API base URL.
    pub api_url: String,
    /// Upper bound on pages fetched by [`RemoteClient::list_commits`] when the
    /// last-seen commit is not found sooner.
    pub max_pages: u32,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            max_pages: 10,
        }
    }
}

/// [`RemoteClient`] backed by the GitHub REST API.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    max_pages: u32,
}

impl GitHubClient {
    /// Creates a client from its settings.
    pub fn new(config: GitHubClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repo-rover/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RoverError::ConfigurationError(format!("GitHub HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.filter(|t| !t.trim().is_empty()),
            max_pages: config.max_pages.max(1),
        })
    }

    fn endpoint(&self, target: &RepositoryTarget, suffix: &str) -> Result<Url> {
        let raw = format!(
            "{}/repos/{}/{}{}",
            self.api_url, target.owner, target.name, suffix
        );
        Url::parse(&raw)
            .map_err(|e| RoverError::ConfigurationError(format!("Invalid API URL '{raw}': {e}")))
    }

    async fn get(&self, url: Url) -> Result<Response> {
        debug!(url = %url, "GitHub API request");
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| RoverError::RemoteUnavailable(format!("Network error: {e}")))
    }

    async fn fetch_commit_page(
        &self,
        target: &RepositoryTarget,
        per_page: u32,
        page: u32,
    ) -> Result<CommitPage> {
        let mut url = self.endpoint(target, "/commits")?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = self.get(url).await?;
        if response.status() == StatusCode::CONFLICT {
            // GitHub answers 409 for a repository without any commits.
            return Ok(CommitPage::default());
        }
        let response = check_status(response, target).await?;
        let has_next = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .is_some_and(has_next_page);

        let commits: Vec<ApiCommit> = response.json().await.map_err(|e| {
            RoverError::RemoteUnavailable(format!("Invalid commit list for {target}: {e}"))
        })?;
        let commits = commits
            .into_iter()
            .map(ApiCommit::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(CommitPage { commits, has_next })
    }

    async fn fetch_latest_release(&self, target: &RepositoryTarget) -> Result<Option<String>> {
        let response = self.get(self.endpoint(target, "/releases/latest")?).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let release: ApiRelease = check_status(response, target)
            .await?
            .json()
            .await
            .map_err(|e| RoverError::RemoteUnavailable(format!("Invalid release: {e}")))?;
        Ok(Some(release.tag_name))
    }
}

impl RemoteClient for GitHubClient {
    fn latest_commit<'a>(
        &'a self,
        target: &'a RepositoryTarget,
    ) -> RemoteFuture<'a, Option<CommitRecord>> {
        Box::pin(async move {
            let page = self.fetch_commit_page(target, 1, 1).await?;
            Ok(page.commits.into_iter().next())
        })
    }

    fn list_commits<'a>(
        &'a self,
        target: &'a RepositoryTarget,
        since: Option<&'a str>,
    ) -> RemoteFuture<'a, CommitListing> {
        Box::pin(async move {
            let mut listing = CommitListing::default();
            for page in 1..=self.max_pages {
                let batch = self
                    .fetch_commit_page(target, COMMITS_PER_PAGE, page)
                    .await?;
                for commit in batch.commits {
                    if since == Some(commit.sha.as_str()) {
                        listing.found_since = true;
                        return Ok(listing);
                    }
                    listing.commits.push(commit);
                }
                if !batch.has_next {
                    return Ok(listing);
                }
            }

            listing.truncated = true;
            warn!(
                repo = %target,
                pages = self.max_pages,
                listed = listing.commits.len(),
                since = since.unwrap_or("-"),
                "Commit history truncated at page limit; older commits are not recorded"
            );
            Ok(listing)
        })
    }

    fn repo_meta<'a>(&'a self, target: &'a RepositoryTarget) -> RemoteFuture<'a, RepoMeta> {
        Box::pin(async move {
            let response = self.get(self.endpoint(target, "")?).await?;
            let repo: ApiRepo = check_status(response, target)
                .await?
                .json()
                .await
                .map_err(|e| RoverError::RemoteUnavailable(format!("Invalid repository: {e}")))?;
            let latest_release = self.fetch_latest_release(target).await?;

            Ok(RepoMeta {
                stars: repo.stargazers_count,
                forks: repo.forks_count,
                description: repo.description,
                latest_release,
            })
        })
    }
}

/// Maps a non-success response onto the error taxonomy.
async fn check_status(response: Response, target: &RepositoryTarget) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if is_rate_limited(status, response.headers()) {
        let retry_after = retry_after_from_headers(response.headers(), Utc::now());
        return Err(RoverError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("Authentication failed for {target} (HTTP {status}): {body}")
        }
        StatusCode::NOT_FOUND => format!("Repository {target} not found"),
        _ => format!("HTTP {status} for {target}: {body}"),
    };
    Err(RoverError::RemoteUnavailable(message))
}

/// GitHub signals throttling with 429, or with 403 plus rate-limit headers.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && (headers.contains_key("retry-after")
            || header_str(headers, "x-ratelimit-remaining") == Some("0"))
}

/// Computes the suggested wait from `Retry-After`, then `x-ratelimit-reset`,
/// falling back to [`DEFAULT_RETRY_AFTER`].
pub(crate) fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Duration::from_secs(secs);
    }

    if let Some(reset) =
        header_str(headers, "x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok())
    {
        let remaining = reset.saturating_sub(now.timestamp()).max(1);
        return Duration::from_secs(remaining.unsigned_abs());
    }

    DEFAULT_RETRY_AFTER
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Returns true if a `Link` header advertises a next page.
fn has_next_page(link: &str) -> bool {
    // Format: <url?page=2>; rel="next", <url?page=N>; rel="last"
    link.split(',').any(|part| part.contains("rel=\"next\""))
}

#[derive(Default)]
struct CommitPage {
    commits: Vec<CommitRecord>,
    has_next: bool,
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiSignature>,
    committer: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    stargazers_count: u64,
    forks_count: u64,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
}

impl ApiCommit {
    fn into_record(self) -> Result<CommitRecord> {
        let signature = self
            .commit
            .author
            .or(self.commit.committer)
            .ok_or_else(|| {
                RoverError::RemoteUnavailable(format!("Commit {} has no author date", self.sha))
            })?;
        let author = self
            .author
            .map(|user| user.login)
            .or(signature.name)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(CommitRecord {
            sha: self.sha,
            message: self.commit.message,
            author,
            timestamp: signature.date,
        })
    }
}
