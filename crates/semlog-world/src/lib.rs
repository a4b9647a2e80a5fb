//! World-state logging for SemLog.
//!
//! Periodically samples the poses of tracked entities and writes only what
//! changed since it was last logged. The sampling pass runs on a dedicated
//! worker thread so the simulation tick never pays for it.
//!
//! # Modules
//!
//! - [`worker`] -- [`WorldStateWorker`] delta pass, [`PoseSource`] seam, config
//! - [`handle`] -- [`SnapshotWorkerHandle`] thread and start/poll protocol
//! - [`error`] -- [`SnapshotError`]

pub mod error;
pub mod handle;
pub mod worker;

pub use error::SnapshotError;
pub use handle::{CycleReport, SnapshotWorkerHandle};
pub use worker::{PoseSource, WorldStateConfig, WorldStateWorker};
