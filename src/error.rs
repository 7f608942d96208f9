//! Error taxonomy for the polling core.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while detecting, recording, or configuring a repository poll.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoverError {
    /// The remote throttled the request and suggested a wait.
    #[error("Rate limited by remote, retry after {} seconds", .retry_after.as_secs())]
    RateLimited {
        /// Wait suggested by the remote before retrying.
        retry_after: Duration,
    },

    /// Network, authentication, or other remote-side failure.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local disk or database write failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Missing or invalid target or credential.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Coarse classification of a [`RoverError`], used by the scheduler to pick a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`RoverError::RateLimited`].
    RateLimited,
    /// See [`RoverError::RemoteUnavailable`].
    RemoteUnavailable,
    /// See [`RoverError::PersistenceFailure`].
    PersistenceFailure,
    /// See [`RoverError::ConfigurationError`].
    ConfigurationError,
}

impl RoverError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            Self::ConfigurationError(_) => ErrorKind::ConfigurationError,
        }
    }

    /// Returns true for errors that must never stop a target's loop.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ConfigurationError(_))
    }

    /// Builds a persistence failure from an operation label and its cause.
    pub(crate) fn persistence(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::PersistenceFailure(format!("{operation}: {cause}"))
    }
}

impl From<rusqlite::Error> for RoverError {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence("sqlite", err)
    }
}

/// Result alias for the polling core.
pub type Result<T, E = RoverError> = std::result::Result<T, E>;
