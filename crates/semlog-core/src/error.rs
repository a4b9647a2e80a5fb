//! Error types for the `semlog-core` crate.

use semlog_world::SnapshotError;
use semlog_writer::WriterError;

use crate::config::ConfigError;
use crate::logger::LoggerState;

/// Errors surfaced by the logger lifecycle.
///
/// Only lifecycle calls return these. Runtime conditions (duplicate
/// overlaps, untagged entities, failed writes, skipped snapshot cycles) are
/// logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The configuration was rejected.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The episode writer could not be opened.
    #[error("writer error: {source}")]
    Writer {
        /// The underlying writer error.
        #[from]
        source: WriterError,
    },

    /// The snapshot worker could not be started or stopped.
    #[error("snapshot worker error: {source}")]
    Snapshot {
        /// The underlying worker error.
        #[from]
        source: SnapshotError,
    },

    /// The operation is not valid in the logger's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the logger was in.
        state: LoggerState,
    },
}
