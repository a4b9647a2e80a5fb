//! Grasp tracking.
//!
//! A hand carries small overlap shapes on its finger bones, split into two
//! opposing [`GraspGroup`]s. The tracker keeps, per hand and object, the set
//! of shapes of each group currently touching the object. A grasp opens the
//! moment both sets are non-empty and closes as soon as either empties.
//!
//! Shapes are tracked by name, so a re-reported begin or an end for a shape
//! that never touched the object leaves the state unchanged.

use std::collections::{BTreeMap, BTreeSet};

use semlog_types::{Entity, EntityId, GraspEvent, GraspGroup, SemanticEvent};
use tracing::{debug, info, trace};

use crate::sink::EventSink;
use crate::{CloseOutcome, meets_minimum};

/// Grasp tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspConfig {
    /// Minimum grasp duration in seconds for an event to be emitted.
    pub min_duration: f64,
}

#[derive(Debug)]
struct FingerContact {
    hand: Entity,
    object: Entity,
    group_a: BTreeSet<String>,
    group_b: BTreeSet<String>,
    open: Option<GraspEvent>,
}

impl FingerContact {
    fn new(hand: &Entity, object: &Entity) -> Self {
        Self {
            hand: hand.clone(),
            object: object.clone(),
            group_a: BTreeSet::new(),
            group_b: BTreeSet::new(),
            open: None,
        }
    }

    const fn shapes_mut(&mut self, group: GraspGroup) -> &mut BTreeSet<String> {
        match group {
            GraspGroup::A => &mut self.group_a,
            GraspGroup::B => &mut self.group_b,
        }
    }

    fn holds(&self) -> bool {
        !self.group_a.is_empty() && !self.group_b.is_empty()
    }

    fn is_released(&self) -> bool {
        self.group_a.is_empty() && self.group_b.is_empty()
    }
}

type HandObject = (EntityId, EntityId);

/// Turns grouped finger overlaps into finished grasp events.
#[derive(Debug)]
pub struct GraspTracker<S> {
    config: GraspConfig,
    contacts: BTreeMap<HandObject, FingerContact>,
    sink: S,
    published: u64,
    dropped: u64,
}

impl<S: EventSink> GraspTracker<S> {
    /// Create a tracker publishing into `sink`.
    pub const fn new(config: GraspConfig, sink: S) -> Self {
        Self {
            config,
            contacts: BTreeMap::new(),
            sink,
            published: 0,
            dropped: 0,
        }
    }

    /// A finger shape of `hand` in `group` started touching `object`.
    ///
    /// Returns `true` if this contact opened a grasp. Overlaps of a hand
    /// with itself are ignored.
    pub fn on_finger_overlap_begin(
        &mut self,
        hand: &Entity,
        object: &Entity,
        shape: &str,
        group: GraspGroup,
        time: f64,
    ) -> bool {
        if hand.id == object.id {
            trace!(hand = %hand.id, shape, "ignoring finger overlap with own hand");
            return false;
        }

        let contact = self
            .contacts
            .entry((hand.id.clone(), object.id.clone()))
            .or_insert_with(|| FingerContact::new(hand, object));
        if !contact.shapes_mut(group).insert(shape.to_owned()) {
            trace!(hand = %hand.id, object = %object.id, shape, "duplicate finger begin ignored");
            return false;
        }
        if contact.open.is_some() || !contact.holds() {
            return false;
        }

        let event = GraspEvent::open(hand.clone(), object.clone(), time);
        debug!(
            hand = %hand.id,
            object = %object.id,
            event_id = %event.id,
            time,
            "grasp opened"
        );
        contact.open = Some(event);
        true
    }

    /// A finger shape of `hand` in `group` stopped touching `object`.
    ///
    /// Closes the grasp if the shape was the last of its group on the
    /// object. Returns [`CloseOutcome::NotOpen`] when no grasp ended.
    pub fn on_finger_overlap_end(
        &mut self,
        hand: &Entity,
        object: &Entity,
        shape: &str,
        group: GraspGroup,
        time: f64,
    ) -> CloseOutcome {
        let key = (hand.id.clone(), object.id.clone());
        let Some(contact) = self.contacts.get_mut(&key) else {
            trace!(hand = %hand.id, object = %object.id, shape, "finger end without begin");
            return CloseOutcome::NotOpen;
        };

        contact.shapes_mut(group).remove(shape);
        let ended = if contact.holds() {
            None
        } else {
            contact.open.take()
        };
        if contact.is_released() {
            self.contacts.remove(&key);
        }

        match ended {
            Some(event) => self.close(event, time, false),
            None => CloseOutcome::NotOpen,
        }
    }

    /// Drop every finger contact of `hand`, closing its grasps at `time`.
    ///
    /// Used when the host stops reporting overlaps for the hand. Returns the
    /// number of grasps published.
    pub fn release_hand(&mut self, hand: &Entity, time: f64) -> usize {
        let keys: Vec<HandObject> = self
            .contacts
            .keys()
            .filter(|(h, _)| h == &hand.id)
            .cloned()
            .collect();

        let mut published = 0_usize;
        for key in keys {
            let Some(event) = self.contacts.remove(&key).and_then(|c| c.open) else {
                continue;
            };
            if self.close(event, time, false).is_published() {
                published = published.saturating_add(1);
            }
        }
        debug!(hand = %hand.id, published, time, "hand released");
        published
    }

    /// Close every open grasp at `end_time`, publishing those long enough.
    ///
    /// Grasps are closed in start-time order. With `forced` set the
    /// published events are marked as interrupted. Returns the number of
    /// events published.
    pub fn finish(&mut self, end_time: f64, forced: bool) -> usize {
        let mut pending: Vec<GraspEvent> = std::mem::take(&mut self.contacts)
            .into_values()
            .filter_map(|c| c.open)
            .collect();
        pending.sort_by(|x, y| x.start_time.total_cmp(&y.start_time));

        let total = pending.len();
        let published = pending
            .into_iter()
            .map(|event| self.close(event, end_time, forced))
            .filter(|outcome| outcome.is_published())
            .count();

        info!(open = total, published, forced, "grasp tracker finished");
        published
    }

    fn close(&mut self, mut event: GraspEvent, end_time: f64, interrupted: bool) -> CloseOutcome {
        let duration = end_time - event.start_time;
        if !meets_minimum(event.start_time, end_time, self.config.min_duration) {
            self.dropped = self.dropped.saturating_add(1);
            debug!(
                hand = %event.hand.id,
                object = %event.object.id,
                duration,
                "grasp shorter than minimum, dropped"
            );
            return CloseOutcome::TooShort { duration };
        }

        event.end_time = Some(end_time);
        event.interrupted = interrupted;
        debug!(
            hand = %event.hand.id,
            object = %event.object.id,
            duration,
            "grasp published"
        );
        self.published = self.published.saturating_add(1);
        self.sink.publish(SemanticEvent::Grasp(event));
        CloseOutcome::Published
    }

    /// Whether `hand` currently grasps `object`.
    pub fn is_grasping(&self, hand: &Entity, object: &Entity) -> bool {
        self.contacts
            .get(&(hand.id.clone(), object.id.clone()))
            .is_some_and(|c| c.open.is_some())
    }

    /// Number of open grasps.
    pub fn open_count(&self) -> usize {
        self.contacts.values().filter(|c| c.open.is_some()).count()
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
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use semlog_types::EntityHandle;

    use super::*;
    use crate::sink::VecSink;

    fn hand() -> Entity {
        Entity::new("RightHand", "Hand", EntityHandle(1))
    }

    fn mug() -> Entity {
        Entity::new("Mug", "Mug", EntityHandle(2))
    }

    fn tracker() -> GraspTracker<VecSink> {
        GraspTracker::new(GraspConfig { min_duration: 0.3 }, VecSink::new())
    }

    #[test]
    fn grasp_needs_both_groups() {
        let (h, m) = (hand(), mug());
        let mut t = tracker();
        assert!(!t.on_finger_overlap_begin(&h, &m, "index_03", GraspGroup::B, 0.0));
        assert!(!t.on_finger_overlap_begin(&h, &m, "middle_03", GraspGroup::B, 0.1));
        assert!(!t.is_grasping(&h, &m));

        assert!(t.on_finger_overlap_begin(&h, &m, "thumb_03", GraspGroup::A, 0.2));
        assert!(t.is_grasping(&h, &m));

        assert_eq!(
            t.on_finger_overlap_end(&h, &m, "thumb_03", GraspGroup::A, 1.2),
            CloseOutcome::Published
        );
        let event = t.sink().events.first().unwrap();
        assert_eq!(event.start_time(), 0.2);
        assert_eq!(event.end_time(), Some(1.2));
        assert_eq!(event.entity_a().id.as_str(), "RightHand");
    }

    #[test]
    fn grasp_survives_while_a_finger_of_each_group_remains() {
        let (h, m) = (hand(), mug());
        let mut t = tracker();
        t.on_finger_overlap_begin(&h, &m, "thumb_03", GraspGroup::A, 0.0);
        t.on_finger_overlap_begin(&h, &m, "index_03", GraspGroup::B, 0.0);
        t.on_finger_overlap_begin(&h, &m, "middle_03", GraspGroup::B, 0.1);

        assert_eq!(
            t.on_finger_overlap_end(&h, &m, "index_03", GraspGroup::B, 0.5),
            CloseOutcome::NotOpen
        );
        assert!(t.is_grasping(&h, &m));
        assert!(t.on_finger_overlap_end(&h, &m, "middle_03", GraspGroup::B, 0.9).is_published());
        assert_eq!(t.open_count(), 0);
    }

    #[test]
    fn duplicate_and_unmatched_signals_are_ignored() {
        let (h, m) = (hand(), mug());
        let mut t = tracker();
        assert_eq!(
            t.on_finger_overlap_end(&h, &m, "thumb_03", GraspGroup::A, 0.0),
            CloseOutcome::NotOpen
        );
        t.on_finger_overlap_begin(&h, &m, "thumb_03", GraspGroup::A, 0.0);
        t.on_finger_overlap_begin(&h, &m, "thumb_03", GraspGroup::A, 0.1);
        t.on_finger_overlap_begin(&h, &m, "index_03", GraspGroup::B, 0.1);

        // One end per shape is enough despite the repeated begin.
        assert!(t.on_finger_overlap_end(&h, &m, "thumb_03", GraspGroup::A, 1.0).is_published());
        assert_eq!(t.sink().events.len(), 1);
    }

    #[test]
    fn own_hand_overlap_is_ignored() {
        let h = hand();
        let mut t = tracker();
        assert!(!t.on_finger_overlap_begin(&h, &h, "thumb_03", GraspGroup::A, 0.0));
        assert!(!t.on_finger_overlap_begin(&h, &h, "index_03", GraspGroup::B, 0.0));
        assert_eq!(t.open_count(), 0);
    }

    #[test]
    fn brief_grasp_is_dropped() {
        let (h, m) = (hand(), mug());
        let mut t = tracker();
        t.on_finger_overlap_begin(&h, &m, "thumb_03", GraspGroup::A, 0.0);
        t.on_finger_overlap_begin(&h, &m, "index_03", GraspGroup::B, 0.0);
        assert!(matches!(
            t.on_finger_overlap_end(&h, &m, "index_03", GraspGroup::B, 0.1),
            CloseOutcome::TooShort { .. }
        ));
        assert_eq!(t.dropped(), 1);
        assert!(t.sink().events.is_empty());
    }

    #[test]
    fn release_hand_closes_its_grasps_only() {
        let (h, m) = (hand(), mug());
        let left = Entity::new("LeftHand", "Hand", EntityHandle(3));
        let mut t = tracker();
        for holder in [&h, &left] {
            t.on_finger_overlap_begin(holder, &m, "thumb_03", GraspGroup::A, 0.0);
            t.on_finger_overlap_begin(holder, &m, "index_03", GraspGroup::B, 0.0);
        }

        assert_eq!(t.release_hand(&h, 1.0), 1);
        assert!(!t.is_grasping(&h, &m));
        assert!(t.is_grasping(&left, &m));

        // Stale ends after the release are no-ops.
        assert_eq!(
            t.on_finger_overlap_end(&h, &m, "thumb_03", GraspGroup::A, 1.1),
            CloseOutcome::NotOpen
        );
    }

    #[test]
    fn finish_interrupts_open_grasps_in_start_order() {
        let (h, m) = (hand(), mug());
        let plate = Entity::new("Plate", "Plate", EntityHandle(4));
        let mut t = tracker();
        t.on_finger_overlap_begin(&h, &plate, "thumb_03", GraspGroup::A, 0.5);
        t.on_finger_overlap_begin(&h, &plate, "index_03", GraspGroup::B, 0.5);
        t.on_finger_overlap_begin(&h, &m, "thumb_02", GraspGroup::A, 0.0);
        t.on_finger_overlap_begin(&h, &m, "index_02", GraspGroup::B, 0.0);

        assert_eq!(t.finish(2.0, true), 2);
        let events = &t.sink().events;
        assert!(events.iter().all(SemanticEvent::interrupted));
        assert_eq!(events.first().unwrap().entity_b().unwrap().id.as_str(), "Mug");
        assert_eq!(t.open_count(), 0);
    }
}
