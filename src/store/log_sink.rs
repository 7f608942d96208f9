//! Human-readable renderings of recorded commits.
//!
//! Append-style sinks deduplicate by sha against what they already wrote, so
//! handing them the same commits twice leaves the output unchanged.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, RoverError};
use crate::repo::{CommitRecord, RepositoryTarget};

/// A destination for rendered commit history.
pub trait LogSink: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Writes `commits` (newest first) for `target`.
    fn write(&self, target: &RepositoryTarget, commits: &[CommitRecord]) -> Result<()>;
}

/// Returns the per-repository log folder under `root`.
pub fn repo_log_dir(root: &Path, target: &RepositoryTarget) -> PathBuf {
    root.join(target.slug())
}

/// Per-repository append-only text log, `<root>/<owner>__<name>/<name>_log.txt`.
#[derive(Debug, Clone)]
pub struct TextLogSink {
    root: PathBuf,
}

impl TextLogSink {
    /// Creates a text sink writing below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the log file path for `target`.
    pub fn path_for(&self, target: &RepositoryTarget) -> PathBuf {
        repo_log_dir(&self.root, target).join(format!("{}_log.txt", target.name))
    }

    fn logged_shas(path: &Path) -> Result<HashSet<String>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(RoverError::persistence("read text log", e)),
        };
        Ok(content
            .lines()
            .filter_map(|line| line.strip_prefix("Sha: "))
            .map(str::to_string)
            .collect())
    }

    fn render(target: &RepositoryTarget, commits: &[&CommitRecord]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Repository: {}", target.url);
        if let Some(newest) = commits.first() {
            let _ = writeln!(out, "Last Commit Timestamp: {}", newest.timestamp.to_rfc3339());
        }
        out.push_str("Commit History:\n");
        for commit in commits {
            let _ = writeln!(out, "Sha: {}", commit.sha);
            // Continuation lines are indented so they can never be read back as a field.
            let message = commit.message.trim_end().replace('\n', "\n  ");
            let _ = writeln!(out, "Message: {message}");
            let _ = writeln!(out, "Author: {}", commit.author);
            let _ = writeln!(out, "Date: {}", commit.timestamp.to_rfc3339());
            out.push('\n');
        }
        out
    }
}

impl LogSink for TextLogSink {
    fn name(&self) -> &'static str {
        "text log"
    }

    fn write(&self, target: &RepositoryTarget, commits: &[CommitRecord]) -> Result<()> {
        let path = self.path_for(target);
        let logged = Self::logged_shas(&path)?;
        let fresh: Vec<&CommitRecord> = commits
            .iter()
            .filter(|c| !logged.contains(&c.sha))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        append_synced(&path, &Self::render(target, &fresh), "text log")?;
        debug!(repo = %target, path = %path.display(), commits = fresh.len(), "Appended text log");
        Ok(())
    }
}

/// One log shared by all repositories, one tab-separated line per commit.
#[derive(Debug, Clone)]
pub struct CombinedLogSink {
    path: PathBuf,
}

impl CombinedLogSink {
    /// Creates a combined sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn logged_keys(&self) -> Result<HashSet<(String, String)>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(RoverError::persistence("read combined log", e)),
        };
        Ok(content
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(5, '\t');
                let _timestamp = fields.next()?;
                let repo = fields.next()?;
                let sha = fields.next()?;
                Some((repo.to_ascii_lowercase(), sha.to_string()))
            })
            .collect())
    }
}

impl LogSink for CombinedLogSink {
    fn name(&self) -> &'static str {
        "combined log"
    }

    fn write(&self, target: &RepositoryTarget, commits: &[CommitRecord]) -> Result<()> {
        let logged = self.logged_keys()?;
        let repo = target.key();
        let identity = target.identity();
        let mut out = String::new();
        // Oldest first so the shared file reads chronologically per repository.
        for commit in commits.iter().rev() {
            if logged.contains(&(identity.clone(), commit.sha.clone())) {
                continue;
            }
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                commit.timestamp.to_rfc3339(),
                repo,
                commit.sha,
                commit.author.replace('\t', " "),
                commit.summary().replace('\t', " ")
            );
        }
        if out.is_empty() {
            return Ok(());
        }
        append_synced(&self.path, &out, "combined log")
    }
}

/// Per-repository HTML page, rewritten with the history handed to each write.
#[derive(Debug, Clone)]
pub struct HtmlLogSink {
    root: PathBuf,
}

impl HtmlLogSink {
    /// Creates an HTML sink writing below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the HTML file path for `target`.
    pub fn path_for(&self, target: &RepositoryTarget) -> PathBuf {
        repo_log_dir(&self.root, target).join(format!("{}_log.html", target.name))
    }

    fn render(target: &RepositoryTarget, commits: &[CommitRecord]) -> String {
        let url = escape_html(&target.url);
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
        let _ = write!(out, "<title>{}</title></head><body>\n", escape_html(&target.key()));
        let _ = writeln!(out, "<h1>Repository: <a href=\"{url}\">{url}</a></h1>");
        out.push_str("<table>\n<tr><th>Sha</th><th>Author</th><th>Date</th><th>Message</th></tr>\n");
        for commit in commits {
            let _ = writeln!(
                out,
                "<tr><td><a href=\"{url}/commit/{sha}\"><code>{short}</code></a></td><td>{author}</td><td>{date}</td><td>{summary}</td></tr>",
                sha = escape_html(&commit.sha),
                short = escape_html(crate::repo::short_sha(&commit.sha)),
                author = escape_html(&commit.author),
                date = commit.timestamp.to_rfc3339(),
                summary = escape_html(commit.summary()),
            );
        }
        out.push_str("</table>\n</body></html>\n");
        out
    }
}

impl LogSink for HtmlLogSink {
    fn name(&self) -> &'static str {
        "html log"
    }

    fn write(&self, target: &RepositoryTarget, commits: &[CommitRecord]) -> Result<()> {
        let path = self.path_for(target);
        let dir = repo_log_dir(&self.root, target);
        fs::create_dir_all(&dir).map_err(|e| RoverError::persistence("create log folder", e))?;

        let mut file = NamedTempFile::new_in(&dir)
            .map_err(|e| RoverError::persistence("create html temp file", e))?;
        file.write_all(Self::render(target, commits).as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| RoverError::persistence("write html log", e))?;
        file.persist(&path)
            .map_err(|e| RoverError::persistence("replace html log", e.error))?;
        Ok(())
    }
}

/// Appends `content` to `path`, creating parents, and fsyncs before returning.
fn append_synced(path: &Path, content: &str, label: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| RoverError::persistence(&format!("create {label} folder"), e))?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RoverError::persistence(&format!("open {label}"), e))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| RoverError::persistence(&format!("write {label}"), e))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::commit;
    use tempfile::TempDir;

    fn target() -> RepositoryTarget {
        RepositoryTarget::new("octocat", "Hello-World").unwrap()
    }

    #[test]
    fn text_log_layout() {
        let dir = TempDir::new().unwrap();
        let sink = TextLogSink::new(dir.path());
        sink.write(&target(), &[commit(1)]).unwrap();

        let content = fs::read_to_string(sink.path_for(&target())).unwrap();
        let expected = format!(
            "Repository: https://github.com/octocat/Hello-World\n\
             Last Commit Timestamp: 2024-01-01T00:01:00+00:00\n\
             Commit History:\n\
             Sha: {sha}\n\
             Message: Commit number 1\n  \n  Body of commit 1\n\
             Author: octocat\n\
             Date: 2024-01-01T00:01:00+00:00\n\n",
            sha = commit(1).sha
        );
        assert_eq!(content, expected);
        assert!(sink
            .path_for(&target())
            .ends_with("octocat__Hello-World/Hello-World_log.txt"));
    }

    #[test]
    fn text_log_skips_already_logged_commits() {
        let dir = TempDir::new().unwrap();
        let sink = TextLogSink::new(dir.path());

        sink.write(&target(), &[commit(2), commit(1)]).unwrap();
        sink.write(&target(), &[commit(2), commit(1)]).unwrap();
        sink.write(&target(), &[commit(3), commit(2), commit(1)]).unwrap();

        let content = fs::read_to_string(sink.path_for(&target())).unwrap();
        for n in 1..=3 {
            let line = format!("Sha: {}", commit(n).sha);
            assert_eq!(content.matches(&line).count(), 1, "commit {n} logged once");
        }
        assert_eq!(content.matches("Repository: ").count(), 2);
    }

    #[test]
    fn combined_log_dedupes_per_repository() {
        let dir = TempDir::new().unwrap();
        let sink = CombinedLogSink::new(dir.path().join("combined.log"));
        let fork = RepositoryTarget::new("someone", "Hello-World").unwrap();

        sink.write(&target(), &[commit(2), commit(1)]).unwrap();
        sink.write(&target(), &[commit(2), commit(1)]).unwrap();
        sink.write(&fork, &[commit(1)]).unwrap();
        let shouting = RepositoryTarget::new("OctoCat", "hello-world").unwrap();
        sink.write(&shouting, &[commit(2)]).unwrap();

        let content = fs::read_to_string(dir.path().join("combined.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(&commit(1).sha));
        assert!(lines[1].contains(&commit(2).sha));
        assert!(lines[2].contains("someone/Hello-World"));
    }

    #[test]
    fn html_log_escapes_content() {
        let dir = TempDir::new().unwrap();
        let sink = HtmlLogSink::new(dir.path());
        let mut evil = commit(1);
        evil.message = "<script>alert('x')</script> & more".to_string();

        sink.write(&target(), &[evil]).unwrap();
        let html = fs::read_to_string(sink.path_for(&target())).unwrap();
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"));
        assert!(!html.contains("<script>"));
    }
}
