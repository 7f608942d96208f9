//! # repo-rover
//!
//! Polls GitHub repositories for new commits and keeps an append-only,
//! idempotent history of what changed.
//!
//! ## Features
//!
//! - One independent polling loop per repository
//! - Rate-limit aware remote calls with a single wait-then-retry
//! - Durable per-repository markers that only move forward
//! - Deduplicated text, HTML, and SQLite history
//!
//! ## Quick Start
//!
//! ```rust
//! use repo_rover::repo::RepositoryTarget;
//!
//! let target = RepositoryTarget::parse("https://github.com/octocat/Hello-World").unwrap();
//! assert_eq!(target.key(), "octocat/Hello-World");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod poll;
pub mod remote;
pub mod repo;
pub mod store;
pub mod utils;

pub use crate::cli::Cli;
pub use crate::error::{ErrorKind, Result, RoverError};

/// The current version of repo-rover.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
