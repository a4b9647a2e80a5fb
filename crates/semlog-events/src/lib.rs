//! Contact, supported-by and grasp event detection.
//!
//! Raw overlap begin/end signals are noisy: physics layers re-report
//! overlaps, report ends without begins, and flicker for a frame or two.
//! The trackers in this crate turn those signals into discrete, bounded
//! semantic events and hand the finished ones to an [`EventSink`].
//!
//! # Pipeline
//!
//! ```text
//! overlap begin/end
//!     |
//!     +--> ContactTracker      --(close, >= min duration)--> EventSink
//!     |
//!     +--> SupportedByTracker
//!             candidates --(timer tick, debounce, SupportTest)--> open events
//!             open events --(contact end / lost support)---------> EventSink
//!
//! finger overlap begin/end (grouped A/B)
//!     |
//!     +--> GraspTracker        --(both groups touching, then release)--> EventSink
//! ```
//!
//! All trackers run on the simulation thread and need no locking.
//!
//! # Modules
//!
//! - [`contact`] -- [`ContactTracker`]
//! - [`grasp`] -- [`GraspTracker`] over grouped finger shapes
//! - [`supported_by`] -- [`SupportedByTracker`] and candidate bookkeeping
//! - [`support`] -- [`SupportTest`] seam and [`VerticalSupportTest`]
//! - [`sink`] -- [`EventSink`] and its implementations

pub mod contact;
pub mod grasp;
pub mod sink;
pub mod support;
pub mod supported_by;

pub use contact::{ContactConfig, ContactTracker};
pub use grasp::{GraspConfig, GraspTracker};
pub use sink::{EventSink, VecSink, WriterSink};
pub use support::{Kinematics, KinematicsSource, SupportTest, VerticalSupportTest};
pub use supported_by::{SupportCandidate, SupportConfig, SupportedByTracker};

/// Result of attempting to close an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloseOutcome {
    /// The event was closed and handed to the sink.
    Published,
    /// The event was closed but dropped for being shorter than the minimum.
    TooShort {
        /// Observed duration in seconds.
        duration: f64,
    },
    /// No matching open event existed.
    NotOpen,
}

impl CloseOutcome {
    /// Whether the event reached the sink.
    pub const fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Emit rule shared by all trackers: strictly positive and at least `minimum`.
pub(crate) fn meets_minimum(start_time: f64, end_time: f64, minimum: f64) -> bool {
    let duration = end_time - start_time;
    duration > 0.0 && duration >= minimum
}
