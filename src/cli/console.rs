//! Terminal rendering of polling progress.

use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::poll::{CycleOutcome, PollObserver, PollState, WaitReason};
use crate::repo::{short_sha, RepositoryTarget};

/// [`PollObserver`] printing cycle results and a live countdown to stderr.
///
/// The countdown line is rewritten in place and only drawn on a terminal.
pub struct ConsoleObserver {
    out: Mutex<StandardStream>,
    live: bool,
}

impl ConsoleObserver {
    /// Creates an observer; `countdown` enables the in-place countdown line.
    pub fn new(countdown: bool) -> Self {
        let interactive = io::stderr().is_terminal();
        let choice = if interactive {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            out: Mutex::new(StandardStream::stderr(choice)),
            live: countdown && interactive,
        }
    }

    fn line(&self, color: Option<Color>, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if self.live {
            let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
        }
        let _ = out.set_color(ColorSpec::new().set_fg(color).set_bold(color.is_some()));
        let _ = write!(out, "{text}");
        let _ = out.reset();
        let _ = writeln!(out);
        let _ = out.flush();
    }
}

impl PollObserver for ConsoleObserver {
    fn on_state(&self, target: &RepositoryTarget, state: &PollState) {
        if let PollState::Backoff(wait) = state {
            self.line(
                Some(Color::Yellow),
                &format!(
                    "{target}: rate limited, retrying in {}",
                    format_countdown(*wait)
                ),
            );
        }
    }

    fn on_countdown(&self, target: &RepositoryTarget, reason: WaitReason, remaining: Duration) {
        if !self.live {
            return;
        }
        let label = match reason {
            WaitReason::Interval => "next check",
            WaitReason::RateLimit => "rate limit lifts",
        };
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{target}: {label} in {}", format_countdown(remaining)))
        );
        let _ = out.flush();
    }

    fn on_cycle(&self, target: &RepositoryTarget, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::NoChange => self.line(None, &format!("{target}: no new commits")),
            CycleOutcome::Recorded {
                new_commits,
                marker,
            } => self.line(
                Some(Color::Green),
                &format!(
                    "{target}: recorded {new_commits} new commit(s), latest {}",
                    short_sha(&marker.sha)
                ),
            ),
            CycleOutcome::Skipped(e) if e.is_transient() => self.line(
                Some(Color::Yellow),
                &format!("{target}: cycle skipped: {e}"),
            ),
            CycleOutcome::Skipped(e) => {
                self.line(Some(Color::Red), &format!("{target}: stopped: {e}"));
            }
        }
    }
}

/// Formats a wait as `H:MM:SS` or `MM:SS`.
fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
