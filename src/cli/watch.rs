//! Polling command: one independent task per configured repository.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::console::ConsoleObserver;
use crate::config::Config;
use crate::poll::{
    ChangeDetector, CycleOutcome, PollObserver, PollScheduler, RateLimiter, Suspender,
};
use crate::remote::{GitHubClient, RemoteClient};
use crate::repo::RepositoryTarget;
use crate::store::{
    CombinedLogSink, FileStateStore, HistoryRecorder, HistoryWriter, HtmlLogSink, SnapshotStore,
    StateStore, TextLogSink,
};

/// Polls repositories for new commits.
#[derive(Parser)]
pub struct WatchCommand {
    /// Runs a single cycle per repository immediately, then exits.
    #[arg(long)]
    pub once: bool,

    /// Disables the live countdown line.
    #[arg(long)]
    pub no_countdown: bool,
}

impl WatchCommand {
    /// Executes the watch command.
    pub async fn execute(self, config: &Config) -> Result<()> {
        let remote: Arc<dyn RemoteClient> = Arc::new(GitHubClient::new(config.client_config())?);
        let observer: Arc<dyn PollObserver> = Arc::new(ConsoleObserver::new(!self.no_countdown));

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                on_signal.cancel();
            }
        });

        let mode = if self.once {
            WatchMode::Once
        } else {
            WatchMode::Forever
        };
        let summary = watch(config, remote, observer, cancel, mode).await?;

        if !summary.failed.is_empty() {
            bail!(
                "Polling stopped for {} repositories: {}",
                summary.failed.len(),
                summary.failed.join(", ")
            );
        }
        Ok(())
    }
}

/// Whether pollers loop until shutdown or run a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Wait an interval before each cycle, until cancelled.
    Forever,
    /// One cycle per repository without waiting.
    Once,
}

/// What happened to the configured repositories.
#[derive(Debug, Default)]
pub struct WatchSummary {
    /// Repositories that were polled.
    pub polled: Vec<RepositoryTarget>,
    /// Repository references whose loop ended with a configuration error.
    pub failed: Vec<String>,
}

/// Builds the stores from `config` and runs a [`PollScheduler`] per repository.
///
/// A repository with a configuration error is reported and skipped without
/// affecting the others.
pub async fn watch(
    config: &Config,
    remote: Arc<dyn RemoteClient>,
    observer: Arc<dyn PollObserver>,
    cancel: CancellationToken,
    mode: WatchMode,
) -> Result<WatchSummary> {
    let recorder = build_recorder(config)?;
    let state: Arc<dyn StateStore> = Arc::new(FileStateStore::new(config.state_dir()));
    let suspender = Suspender::new(cancel, observer);
    let detector = ChangeDetector::new(remote, RateLimiter::new(suspender.clone()));

    let mut summary = WatchSummary::default();
    let mut seen = HashSet::new();
    let mut tasks = JoinSet::new();

    for (raw, parsed) in config.targets() {
        let target = match parsed {
            Ok(target) => target,
            Err(e) => {
                error!(repo = raw, error = %e, "Skipping repository");
                summary.failed.push(raw.to_string());
                continue;
            }
        };
        if !seen.insert(target.identity()) {
            warn!(repo = %target, "Repository listed twice, polling it once");
            continue;
        }

        let scheduler = PollScheduler::new(
            target.clone(),
            config.interval(),
            detector.clone(),
            state.clone(),
            recorder.clone(),
            suspender.clone(),
        );
        summary.polled.push(target.clone());
        tasks.spawn(async move {
            let result = match mode {
                WatchMode::Forever => scheduler.run().await,
                WatchMode::Once => match scheduler.run_cycle().await {
                    CycleOutcome::Skipped(e) if !e.is_transient() => Err(e),
                    _ => Ok(()),
                },
            };
            (target, result)
        });
    }

    if summary.polled.is_empty() {
        bail!("No valid repositories configured");
    }
    info!(repositories = summary.polled.len(), ?mode, "Polling started");

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((target, Err(e))) => {
                error!(repo = %target, error = %e, "Polling ended");
                summary.failed.push(target.key());
            }
            Err(e) => {
                error!(error = %e, "Polling task panicked");
                summary.failed.push(format!("<task: {e}>"));
            }
        }
    }
    Ok(summary)
}

fn build_recorder(config: &Config) -> Result<Arc<dyn HistoryRecorder>> {
    let snapshots = SnapshotStore::open(&config.database_path())?;
    let mut writer = HistoryWriter::new(snapshots).with_sink(TextLogSink::new(&config.data_dir));
    if config.logs.html {
        writer = writer.with_sink(HtmlLogSink::new(&config.data_dir));
    }
    if let Some(path) = config.combined_log_path() {
        writer = writer.with_sink(CombinedLogSink::new(path));
    }
    Ok(Arc::new(writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::poll::NoopObserver;
    use crate::remote::mock::ScriptedRemote;

    fn config(dir: &TempDir, repositories: &[&str]) -> Config {
        let mut config = Config::from_yaml("interval_minutes: 1\n").unwrap();
        config.repositories = repositories.iter().map(ToString::to_string).collect();
        config.data_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn once_records_each_repository_and_skips_bad_ones() {
        let dir = TempDir::new().unwrap();
        let config = config(
            &dir,
            &[
                "octocat/Hello-World",
                "https://github.com/rust-lang/rust.git",
                "not a repository",
                "octocat/Hello-World",
                "OctoCat/hello-world",
            ],
        );

        let summary = watch(
            &config,
            Arc::new(ScriptedRemote::with_commits(2)),
            Arc::new(NoopObserver),
            CancellationToken::new(),
            WatchMode::Once,
        )
        .await
        .unwrap();

        assert_eq!(summary.polled.len(), 2);
        assert_eq!(summary.failed, vec!["not a repository".to_string()]);

        let state = FileStateStore::new(config.state_dir());
        for target in &summary.polled {
            assert!(state.read(target).unwrap().is_some());
            let folder = dir.path().join(target.slug());
            assert!(folder.join(format!("{}_log.txt", target.name)).exists());
            assert!(folder.join(format!("{}_log.html", target.name)).exists());
        }
        assert_eq!(
            SnapshotStore::open(&config.database_path()).unwrap().all().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn no_valid_repositories_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &["gitlab.com/a/b/c"]);
        let result = watch(
            &config,
            Arc::new(ScriptedRemote::with_commits(1)),
            Arc::new(NoopObserver),
            CancellationToken::new(),
            WatchMode::Once,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn forever_mode_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &["octocat/Hello-World"]);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(90)).await;
            stopper.cancel();
        });

        let summary = watch(
            &config,
            Arc::new(ScriptedRemote::with_commits(1)),
            Arc::new(NoopObserver),
            cancel,
            WatchMode::Forever,
        )
        .await
        .unwrap();

        assert!(summary.failed.is_empty());
        let state = FileStateStore::new(config.state_dir());
        assert!(state.read(&summary.polled[0]).unwrap().is_some());
    }
}
