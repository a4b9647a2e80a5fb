//! Error types for the `semlog-world` crate.

/// Errors raised by the snapshot worker handle.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A cycle was requested while the previous one was still running.
    /// The request is dropped, never queued.
    #[error("snapshot cycle at t={timestamp} skipped: previous cycle still in flight")]
    CycleInFlight {
        /// Timestamp of the rejected cycle.
        timestamp: f64,
    },

    /// The worker thread could not be spawned.
    #[error("failed to spawn snapshot worker thread: {source}")]
    Spawn {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The worker thread is no longer receiving commands.
    #[error("snapshot worker has shut down")]
    WorkerGone,

    /// The worker thread panicked before it could be joined.
    #[error("snapshot worker thread panicked")]
    WorkerPanicked,
}
