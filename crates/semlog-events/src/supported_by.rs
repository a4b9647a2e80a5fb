//! Supported-by event tracking.
//!
//! "Resting on" is too noisy to decide frame by frame, so contact only
//! registers a [`SupportCandidate`]. Candidates are evaluated on a fixed
//! interval timer, independent of the frame rate. A candidate older than
//! the debounce window whose [`SupportTest`] holds is promoted to an open
//! [`SupportedByEvent`] with a freshly minted [`PairId`].
//!
//! Open events are re-checked on the same timer. When the relation no
//! longer holds (the object was lifted, or the roles reversed) the event is
//! closed and the pair goes back to being a candidate. Contact end closes
//! the event outright.

use std::collections::BTreeMap;

use semlog_types::{Entity, PairId, PairKey, RecurringTimer, SemanticEvent, SupportedByEvent};
use tracing::{debug, info, trace};

use crate::sink::EventSink;
use crate::support::SupportTest;
use crate::{CloseOutcome, meets_minimum};

/// Supported-by tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportConfig {
    /// Minimum duration in seconds for an event to be emitted.
    pub min_duration: f64,
    /// Seconds between candidate evaluations.
    pub check_interval: f64,
    /// Minimum candidate age in seconds before promotion.
    pub debounce: f64,
}

/// A contact that may turn into a supported-by relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportCandidate {
    /// Entity whose contact area reported the overlap.
    pub owner: Entity,
    /// The entity it touched.
    pub other: Entity,
    /// `other` cannot itself be supported (it has no contact area of its
    /// own, e.g. a table), so only `owner` on `other` is tested.
    pub can_only_support: bool,
    /// When the candidate was registered (or last returned to pending).
    pub first_seen: f64,
}

impl SupportCandidate {
    /// Seconds since the candidate was first seen.
    pub fn age(&self, now: f64) -> f64 {
        now - self.first_seen
    }

    /// Resolve the support direction, if any, as `(supported, supporting)`.
    fn direction(&self, test: &dyn SupportTest) -> Option<(&Entity, &Entity)> {
        if test.is_supported_by(&self.owner, &self.other) {
            Some((&self.owner, &self.other))
        } else if !self.can_only_support && test.is_supported_by(&self.other, &self.owner) {
            Some((&self.other, &self.owner))
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct OpenSupport {
    key: PairKey,
    event: SupportedByEvent,
    candidate: SupportCandidate,
}

/// Promotes contact candidates to supported-by events.
#[derive(Debug)]
pub struct SupportedByTracker<S> {
    config: SupportConfig,
    candidates: BTreeMap<PairKey, SupportCandidate>,
    active: BTreeMap<PairKey, PairId>,
    open: BTreeMap<PairId, OpenSupport>,
    last_pair_id: u64,
    timer: Option<RecurringTimer>,
    sink: S,
    published: u64,
    dropped: u64,
}

impl<S: EventSink> SupportedByTracker<S> {
    /// Create a tracker publishing into `sink`. The evaluation timer is
    /// armed by [`start`](Self::start).
    pub const fn new(config: SupportConfig, sink: S) -> Self {
        Self {
            config,
            candidates: BTreeMap::new(),
            active: BTreeMap::new(),
            open: BTreeMap::new(),
            last_pair_id: 0,
            timer: None,
            sink,
            published: 0,
            dropped: 0,
        }
    }

    /// Arm the periodic evaluation timer at `now`.
    pub fn start(&mut self, now: f64) {
        self.timer = Some(RecurringTimer::new(self.config.check_interval, now));
    }

    /// Drive the evaluation timer. Runs [`check_candidates`] when due and
    /// returns the number of promotions.
    ///
    /// [`check_candidates`]: Self::check_candidates
    pub fn tick(&mut self, now: f64, test: &dyn SupportTest) -> usize {
        let due = self.timer.as_mut().is_some_and(|timer| timer.poll(now));
        if due {
            self.check_candidates(now, test)
        } else {
            0
        }
    }

    /// Register `other` as a support candidate of `owner` at `time`.
    ///
    /// Returns `false` for self pairs and for pairs already pending or
    /// active.
    pub fn add_candidate(
        &mut self,
        owner: &Entity,
        other: &Entity,
        can_only_support: bool,
        time: f64,
    ) -> bool {
        let key = PairKey::new(&owner.id, &other.id);
        if key.is_self_pair() || self.candidates.contains_key(&key) || self.active.contains_key(&key)
        {
            trace!(pair = %key, "support candidate already tracked");
            return false;
        }

        debug!(owner = %owner.id, other = %other.id, can_only_support, "support candidate added");
        self.candidates.insert(
            key,
            SupportCandidate {
                owner: owner.clone(),
                other: other.clone(),
                can_only_support,
                first_seen: time,
            },
        );
        true
    }

    /// Whether `a` and `b` form a pending candidate.
    pub fn is_candidate(&self, a: &Entity, b: &Entity) -> bool {
        self.candidates.contains_key(&PairKey::new(&a.id, &b.id))
    }

    /// Evaluate every candidate and re-check every open event at `now`.
    ///
    /// Returns the number of candidates promoted to open events.
    pub fn check_candidates(&mut self, now: f64, test: &dyn SupportTest) -> usize {
        self.recheck_open(now, test);

        let ready: Vec<(PairKey, Entity, Entity)> = self
            .candidates
            .iter()
            .filter(|(_, c)| c.age(now) >= self.config.debounce)
            .filter_map(|(key, c)| {
                c.direction(test)
                    .map(|(supported, supporting)| (key.clone(), supported.clone(), supporting.clone()))
            })
            .collect();

        let promoted = ready.len();
        for (key, supported, supporting) in ready {
            let Some(candidate) = self.candidates.remove(&key) else {
                continue;
            };
            let pair_id = self.mint_pair_id();
            let event = SupportedByEvent::open(supported, supporting, now, pair_id);
            debug!(
                supported = %event.supported.id,
                supporting = %event.supporting.id,
                %pair_id,
                time = now,
                "supported-by opened"
            );
            self.active.insert(key.clone(), pair_id);
            self.open.insert(
                pair_id,
                OpenSupport {
                    key,
                    event,
                    candidate,
                },
            );
        }
        promoted
    }

    fn recheck_open(&mut self, now: f64, test: &dyn SupportTest) {
        let lost: Vec<PairId> = self
            .open
            .iter()
            .filter(|(_, o)| !test.is_supported_by(&o.event.supported, &o.event.supporting))
            .map(|(pair_id, _)| *pair_id)
            .collect();

        for pair_id in lost {
            if let Some(candidate) = self.close(pair_id, now, false).1 {
                debug!(%pair_id, "support no longer holds, back to candidate");
                let key = PairKey::new(&candidate.owner.id, &candidate.other.id);
                self.candidates.insert(
                    key,
                    SupportCandidate {
                        first_seen: now,
                        ..candidate
                    },
                );
            }
        }
    }

    /// Handle contact end between `a` and `b` at `time`.
    ///
    /// A pending candidate is discarded; an open event is closed and
    /// published if long enough.
    pub fn on_contact_end(&mut self, a: &Entity, b: &Entity, time: f64) -> CloseOutcome {
        let key = PairKey::new(&a.id, &b.id);
        if self.candidates.remove(&key).is_some() {
            trace!(pair = %key, "support candidate discarded on contact end");
            return CloseOutcome::NotOpen;
        }
        match self.active.get(&key).copied() {
            Some(pair_id) => self.finish_and_publish_event(pair_id, time),
            None => CloseOutcome::NotOpen,
        }
    }

    /// Close the open event identified by `pair_id` at `end_time`.
    ///
    /// Publishes it if it lasted at least the minimum duration and removes
    /// all bookkeeping for the pair.
    pub fn finish_and_publish_event(&mut self, pair_id: PairId, end_time: f64) -> CloseOutcome {
        self.close(pair_id, end_time, false).0
    }

    /// Close whichever of two pair ids is open (hosts report both
    /// directions of a pair when support ends).
    pub fn on_supported_by_end(&mut self, first: PairId, second: PairId, time: f64) -> CloseOutcome {
        match self.finish_and_publish_event(first, time) {
            CloseOutcome::NotOpen => self.finish_and_publish_event(second, time),
            outcome => outcome,
        }
    }

    /// Close all open events at `end_time` and discard every candidate.
    ///
    /// Returns the number of events published.
    pub fn finish(&mut self, end_time: f64, forced: bool) -> usize {
        self.timer = None;
        let discarded = self.candidates.len();
        self.candidates.clear();

        let mut pending: Vec<(f64, PairId)> = self
            .open
            .values()
            .map(|o| (o.event.start_time, o.event.pair_id))
            .collect();
        pending.sort_by(|x, y| x.0.total_cmp(&y.0));

        let total = pending.len();
        let published = pending
            .into_iter()
            .map(|(_, pair_id)| self.close(pair_id, end_time, forced).0)
            .filter(|outcome| outcome.is_published())
            .count();

        info!(
            open = total,
            published, discarded_candidates = discarded, forced, "supported-by tracker finished"
        );
        published
    }

    fn close(
        &mut self,
        pair_id: PairId,
        end_time: f64,
        interrupted: bool,
    ) -> (CloseOutcome, Option<SupportCandidate>) {
        let Some(OpenSupport {
            key,
            mut event,
            candidate,
        }) = self.open.remove(&pair_id)
        else {
            trace!(%pair_id, "no open supported-by event");
            return (CloseOutcome::NotOpen, None);
        };
        self.active.remove(&key);

        let duration = end_time - event.start_time;
        if !meets_minimum(event.start_time, end_time, self.config.min_duration) {
            self.dropped = self.dropped.saturating_add(1);
            debug!(%pair_id, duration, "supported-by shorter than minimum, dropped");
            return (CloseOutcome::TooShort { duration }, Some(candidate));
        }

        event.end_time = Some(end_time);
        event.interrupted = interrupted;
        debug!(
            supported = %event.supported.id,
            supporting = %event.supporting.id,
            %pair_id,
            duration,
            "supported-by published"
        );
        self.published = self.published.saturating_add(1);
        self.sink.publish(SemanticEvent::SupportedBy(event));
        (CloseOutcome::Published, Some(candidate))
    }

    fn mint_pair_id(&mut self) -> PairId {
        loop {
            self.last_pair_id = self.last_pair_id.wrapping_add(1);
            let candidate = PairId(self.last_pair_id);
            if candidate.0 != 0 && !self.open.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Pair id of the open event between `a` and `b`, if any.
    pub fn open_pair_id(&self, a: &Entity, b: &Entity) -> Option<PairId> {
        self.active.get(&PairKey::new(&a.id, &b.id)).copied()
    }

    /// The open event for `pair_id`, if any.
    pub fn open_event(&self, pair_id: PairId) -> Option<&SupportedByEvent> {
        self.open.get(&pair_id).map(|o| &o.event)
    }

    /// Number of pending candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Number of open supported-by events.
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

    /// Borrow the sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the tracker and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
