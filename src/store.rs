//! Durable state: last-seen markers, log files, and the snapshot database.

pub mod database;
pub mod history;
pub mod log_sink;
pub mod state;

pub use database::SnapshotStore;
pub use history::{AppendReport, HistoryRecorder, HistoryWriter};
pub use log_sink::{CombinedLogSink, HtmlLogSink, LogSink, TextLogSink};
pub use state::{FileStateStore, MarkerUpdate, StateStore};
