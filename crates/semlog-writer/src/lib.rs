//! Episodic log writers for SemLog.
//!
//! Trackers and the world-state worker hand finished events and snapshots to
//! an [`EpisodicWriter`]. Writers are shared between the simulation thread
//! and the snapshot worker thread, so every implementation is `Send + Sync`
//! and serializes access to its files internally.
//!
//! # Backends
//!
//! ```text
//! WriterBackendKind
//!     |
//!     +-- Json   --> <dir>/<episode>_ED.json, <episode>_WS.json (one document per line)
//!     +-- Bson   --> <dir>/<episode>_ED.bson, <episode>_WS.bson (concatenated documents)
//!     +-- Memory --> records kept in memory (tests, dry runs)
//! ```
//!
//! File backends also write `<episode>_META.json` describing the episode.

pub mod backend;
pub mod bson_writer;
pub mod error;
pub mod json;
pub mod memory;

use semlog_types::{SemanticEvent, Snapshot};

pub use backend::{EpisodeFiles, EpisodeMetadata, WriterBackendKind, create_writer};
pub use bson_writer::BsonWriter;
pub use error::WriterError;
pub use json::JsonWriter;
pub use memory::MemoryWriter;

/// Sink for finished events and world-state snapshots.
///
/// Each call appends one record. A failed call leaves the writer usable;
/// callers log the failure and carry on.
pub trait EpisodicWriter: Send + Sync {
    /// Append one finished event to the event log.
    fn write_event(&self, event: &SemanticEvent) -> Result<(), WriterError>;

    /// Append one snapshot to the world-state log.
    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), WriterError>;

    /// Flush buffered records to durable storage.
    fn flush(&self) -> Result<(), WriterError>;

    /// The backend this writer implements.
    fn backend(&self) -> WriterBackendKind;
}
