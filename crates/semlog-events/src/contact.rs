//! Contact event tracking.
//!
//! A contact event spans from the first overlap begin between two distinct
//! entities to the matching overlap end. Pairs are unordered: the tracker
//! keys open events by [`PairKey`], so `begin(A, B)` and `end(B, A)` refer
//! to the same event and both sides of a mutual overlap report collapse
//! into one.
//!
//! Contacts shorter than [`ContactConfig::min_duration`] are physics noise
//! and are dropped without reaching the sink.

use std::collections::BTreeMap;

use semlog_types::{ContactEvent, Entity, PairKey, SemanticEvent};
use tracing::{debug, info, trace};

use crate::sink::EventSink;
use crate::{CloseOutcome, meets_minimum};

/// Contact tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactConfig {
    /// Minimum contact duration in seconds for an event to be emitted.
    pub min_duration: f64,
}

/// Turns overlap begin/end pairs into finished contact events.
#[derive(Debug)]
pub struct ContactTracker<S> {
    config: ContactConfig,
    open: BTreeMap<PairKey, ContactEvent>,
    sink: S,
    published: u64,
    dropped: u64,
}

impl<S: EventSink> ContactTracker<S> {
    /// Create a tracker publishing into `sink`.
    pub const fn new(config: ContactConfig, sink: S) -> Self {
        Self {
            config,
            open: BTreeMap::new(),
            sink,
            published: 0,
            dropped: 0,
        }
    }

    /// Handle an overlap begin between `a` and `b` at `time`.
    ///
    /// Opens a contact event unless one is already open for the pair.
    /// Returns `true` if a new event was opened. Self-overlaps and
    /// re-entrant begins are ignored.
    pub fn on_overlap_begin(&mut self, a: &Entity, b: &Entity, time: f64) -> bool {
        let key = PairKey::new(&a.id, &b.id);
        if key.is_self_pair() {
            trace!(entity = %a.id, "ignoring self overlap");
            return false;
        }
        if self.open.contains_key(&key) {
            trace!(pair = %key, time, "duplicate overlap begin ignored");
            return false;
        }

        let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
        let event = ContactEvent::open(first.clone(), second.clone(), time);
        debug!(pair = %key, event_id = %event.id, time, "contact opened");
        self.open.insert(key, event);
        true
    }

    /// Handle an overlap end between `a` and `b` at `time`.
    ///
    /// Closes the open event for the pair and publishes it if it lasted at
    /// least the minimum duration. An end without a matching begin is a
    /// no-op.
    pub fn on_overlap_end(&mut self, a: &Entity, b: &Entity, time: f64) -> CloseOutcome {
        let key = PairKey::new(&a.id, &b.id);
        match self.open.remove(&key) {
            Some(event) => self.close(event, time, false),
            None => {
                trace!(pair = %key, time, "overlap end without open contact");
                CloseOutcome::NotOpen
            }
        }
    }

    /// Close every open event at `end_time`, publishing those long enough.
    ///
    /// Events are closed in start-time order. With `forced` set the
    /// published events are marked as interrupted. Returns the number of
    /// events published.
    pub fn finish(&mut self, end_time: f64, forced: bool) -> usize {
        let mut pending: Vec<ContactEvent> = std::mem::take(&mut self.open).into_values().collect();
        pending.sort_by(|x, y| x.start_time.total_cmp(&y.start_time));

        let total = pending.len();
        let published = pending
            .into_iter()
            .map(|event| self.close(event, end_time, forced))
            .filter(|outcome| outcome.is_published())
            .count();

        info!(open = total, published, forced, "contact tracker finished");
        published
    }

    fn close(&mut self, mut event: ContactEvent, end_time: f64, interrupted: bool) -> CloseOutcome {
        let duration = end_time - event.start_time;
        if !meets_minimum(event.start_time, end_time, self.config.min_duration) {
            self.dropped = self.dropped.saturating_add(1);
            debug!(
                first = %event.first.id,
                second = %event.second.id,
                duration,
                "contact shorter than minimum, dropped"
            );
            return CloseOutcome::TooShort { duration };
        }

        event.end_time = Some(end_time);
        event.interrupted = interrupted;
        debug!(
            first = %event.first.id,
            second = %event.second.id,
            duration,
            "contact published"
        );
        self.published = self.published.saturating_add(1);
        self.sink.publish(SemanticEvent::Contact(event));
        CloseOutcome::Published
    }

    /// Whether a contact between `a` and `b` is currently open.
    pub fn is_open(&self, a: &Entity, b: &Entity) -> bool {
        self.open.contains_key(&PairKey::new(&a.id, &b.id))
    }

    /// Number of open contact events.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Events published since creation.
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Events dropped by the duration filter since creation.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Active configuration.
    pub const fn config(&self) -> &ContactConfig {
        &self.config
    }

    /// Borrow the sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the tracker and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
