//! Finished-event sinks.
//!
//! Trackers receive their sink at construction and call it synchronously
//! the moment an event closes, so the order a sink observes is the real-time
//! order in which that tracker's events closed.

use std::sync::Arc;

use semlog_types::SemanticEvent;
use semlog_writer::EpisodicWriter;
use tracing::warn;

/// Receiver of finished events.
pub trait EventSink {
    /// Called once per finished event that passed the duration filter.
    fn publish(&mut self, event: SemanticEvent);
}

/// Sink that collects events in a vector.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    /// Events received so far, in publish order.
    pub events: Vec<SemanticEvent>,
}

impl VecSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for VecSink {
    fn publish(&mut self, event: SemanticEvent) {
        self.events.push(event);
    }
}

/// Sink forwarding events to an [`EpisodicWriter`].
///
/// A failed write is logged and counted. The event still counts as
/// published; in-memory tracker state is never rolled back.
pub struct WriterSink {
    writer: Arc<dyn EpisodicWriter>,
    published: u64,
    write_failures: u64,
}

impl WriterSink {
    /// Wrap a shared writer.
    pub fn new(writer: Arc<dyn EpisodicWriter>) -> Self {
        Self {
            writer,
            published: 0,
            write_failures: 0,
        }
    }

    /// Events handed to the writer, including failed writes.
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Writes that returned an error.
    pub const fn write_failures(&self) -> u64 {
        self.write_failures
    }
}

impl core::fmt::Debug for WriterSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WriterSink")
            .field("backend", &self.writer.backend())
            .field("published", &self.published)
            .field("write_failures", &self.write_failures)
            .finish()
    }
}

impl EventSink for WriterSink {
    fn publish(&mut self, event: SemanticEvent) {
        self.published = self.published.saturating_add(1);
        if let Err(e) = self.writer.write_event(&event) {
            self.write_failures = self.write_failures.saturating_add(1);
            warn!(
                error = %e,
                kind = %event.kind(),
                event_id = %event.id(),
                "failed to persist finished event"
            );
        }
    }
}
