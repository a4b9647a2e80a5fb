//! In-memory writer.

use parking_lot::Mutex;
use semlog_types::{SemanticEvent, Snapshot};

use crate::backend::WriterBackendKind;
use crate::error::WriterError;
use crate::EpisodicWriter;

/// Writer that keeps every record in memory. Never fails.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    events: Mutex<Vec<SemanticEvent>>,
    snapshots: Mutex<Vec<Snapshot>>,
    flushes: Mutex<u64>,
}

impl MemoryWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written so far, in write order.
    pub fn events(&self) -> Vec<SemanticEvent> {
        self.events.lock().clone()
    }

    /// Snapshots written so far, in write order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    /// Number of `flush` calls received.
    pub fn flush_count(&self) -> u64 {
        *self.flushes.lock()
    }
}

impl EpisodicWriter for MemoryWriter {
    fn write_event(&self, event: &SemanticEvent) -> Result<(), WriterError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), WriterError> {
        self.snapshots.lock().push(snapshot.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), WriterError> {
        let mut flushes = self.flushes.lock();
        *flushes = flushes.saturating_add(1);
        Ok(())
    }

    fn backend(&self) -> WriterBackendKind {
        WriterBackendKind::Memory
    }
}
