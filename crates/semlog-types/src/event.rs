//! Semantic events derived from contact signals.
//!
//! Events are opened by the trackers when a relationship starts and closed
//! when it ends. Only closed events that satisfy the minimum-duration filter
//! are ever handed to a writer, so every [`SemanticEvent`] seen downstream
//! has both a start and an end time.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::{EventId, PairId};

/// Discriminant of a [`SemanticEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Two entities were in direct physical overlap.
    Contact,
    /// One entity rested on another.
    SupportedBy,
    /// A hand held an object between opposing fingers.
    Grasp,
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Contact => f.write_str("Contact"),
            Self::SupportedBy => f.write_str("SupportedBy"),
            Self::Grasp => f.write_str("Grasp"),
        }
    }
}

/// A bounded interval of direct contact between two entities.
///
/// `first` and `second` are stored in canonical order (see
/// [`PairKey`](crate::entity::PairKey)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Generated event id.
    pub id: EventId,
    /// Canonically smaller entity of the pair.
    pub first: Entity,
    /// Canonically larger entity of the pair.
    pub second: Entity,
    /// Time the contact started (seconds).
    pub start_time: f64,
    /// Time the contact ended, absent while open.
    pub end_time: Option<f64>,
    /// Closed by a forced shutdown rather than by a matching end signal.
    #[serde(default)]
    pub interrupted: bool,
}

impl ContactEvent {
    /// Open a contact event at `start_time`.
    pub fn open(first: Entity, second: Entity, start_time: f64) -> Self {
        Self {
            id: EventId::new(),
            first,
            second,
            start_time,
            end_time: None,
            interrupted: false,
        }
    }
}

/// A directional relationship where `supported` rests on `supporting`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedByEvent {
    /// Generated event id.
    pub id: EventId,
    /// Entity being held up.
    pub supported: Entity,
    /// Entity holding the other up.
    pub supporting: Entity,
    /// Time the support started (seconds).
    pub start_time: f64,
    /// Time the support ended, absent while open.
    pub end_time: Option<f64>,
    /// Correlation token matching begin and end.
    pub pair_id: PairId,
    /// Closed by a forced shutdown rather than by a matching end signal.
    #[serde(default)]
    pub interrupted: bool,
}

impl SupportedByEvent {
    /// Open a supported-by event at `start_time`.
    pub fn open(supported: Entity, supporting: Entity, start_time: f64, pair_id: PairId) -> Self {
        Self {
            id: EventId::new(),
            supported,
            supporting,
            start_time,
            end_time: None,
            pair_id,
            interrupted: false,
        }
    }
}

/// Which side of the hand a finger overlap shape belongs to.
///
/// A grasp needs contact from both sides: the thumb opposes the fingers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GraspGroup {
    /// Thumb side.
    A,
    /// Finger side.
    B,
}

/// A hand holding an object.
///
/// Open while fingers from both opposing groups of the hand touch the
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspEvent {
    /// Generated event id.
    pub id: EventId,
    /// The grasping hand.
    pub hand: Entity,
    /// The grasped object.
    pub object: Entity,
    /// Time the grasp started (seconds).
    pub start_time: f64,
    /// Time the grasp ended, absent while open.
    pub end_time: Option<f64>,
    /// Closed by a forced shutdown rather than by a release.
    #[serde(default)]
    pub interrupted: bool,
}

impl GraspEvent {
    /// Open a grasp event at `start_time`.
    pub fn open(hand: Entity, object: Entity, start_time: f64) -> Self {
        Self {
            id: EventId::new(),
            hand,
            object,
            start_time,
            end_time: None,
            interrupted: false,
        }
    }
}

/// A finished event as consumed by writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SemanticEvent {
    /// A finished contact event.
    Contact(ContactEvent),
    /// A finished supported-by event.
    SupportedBy(SupportedByEvent),
    /// A finished grasp event.
    Grasp(GraspEvent),
}

impl SemanticEvent {
    /// Event discriminant.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Contact(_) => EventKind::Contact,
            Self::SupportedBy(_) => EventKind::SupportedBy,
            Self::Grasp(_) => EventKind::Grasp,
        }
    }

    /// Generated event id.
    pub const fn id(&self) -> EventId {
        match self {
            Self::Contact(e) => e.id,
            Self::SupportedBy(e) => e.id,
            Self::Grasp(e) => e.id,
        }
    }

    /// First participant (`first` for contacts, `supported` for support,
    /// `hand` for grasps).
    pub const fn entity_a(&self) -> &Entity {
        match self {
            Self::Contact(e) => &e.first,
            Self::SupportedBy(e) => &e.supported,
            Self::Grasp(e) => &e.hand,
        }
    }

    /// Second participant (`second` for contacts, `supporting` for support,
    /// `object` for grasps).
    pub const fn entity_b(&self) -> Option<&Entity> {
        match self {
            Self::Contact(e) => Some(&e.second),
            Self::SupportedBy(e) => Some(&e.supporting),
            Self::Grasp(e) => Some(&e.object),
        }
    }

    /// Start time in seconds.
    pub const fn start_time(&self) -> f64 {
        match self {
            Self::Contact(e) => e.start_time,
            Self::SupportedBy(e) => e.start_time,
            Self::Grasp(e) => e.start_time,
        }
    }

    /// End time in seconds, if closed.
    pub const fn end_time(&self) -> Option<f64> {
        match self {
            Self::Contact(e) => e.end_time,
            Self::SupportedBy(e) => e.end_time,
            Self::Grasp(e) => e.end_time,
        }
    }

    /// `end_time - start_time`, if closed.
    pub fn duration(&self) -> Option<f64> {
        self.end_time().map(|end| end - self.start_time())
    }

    /// Whether the event was cut short by a forced shutdown.
    pub const fn interrupted(&self) -> bool {
        match self {
            Self::Contact(e) => e.interrupted,
            Self::SupportedBy(e) => e.interrupted,
            Self::Grasp(e) => e.interrupted,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entity::EntityHandle;

    #[test]
    fn serialized_event_is_tagged_with_kind() {
        let mut event = ContactEvent::open(
            Entity::new("Bowl", "Bowl", EntityHandle(1)),
            Entity::new("Spoon", "Spoon", EntityHandle(2)),
            1.0,
        );
        event.end_time = Some(2.5);
        let json = serde_json::to_value(SemanticEvent::Contact(event)).unwrap();
        assert_eq!(json["kind"], "Contact");
        assert_eq!(json["first"]["id"], "Bowl");
        assert_eq!(json["end_time"], 2.5);
        assert_eq!(json["interrupted"], false);
    }

    #[test]
    fn accessors_cover_supported_by() {
        let mut event = SupportedByEvent::open(
            Entity::new("Cup", "Cup", EntityHandle(3)),
            Entity::new("Table", "Table", EntityHandle(4)),
            0.5,
            PairId(9),
        );
        event.end_time = Some(1.5);
        let event = SemanticEvent::SupportedBy(event);
        assert_eq!(event.kind(), EventKind::SupportedBy);
        assert_eq!(event.entity_a().id.as_str(), "Cup");
        assert_eq!(event.entity_b().map(|e| e.id.as_str()), Some("Table"));
        assert!((event.duration().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn grasp_serializes_hand_and_object() {
        let mut event = GraspEvent::open(
            Entity::new("RightHand", "Hand", EntityHandle(5)),
            Entity::new("Mug", "Mug", EntityHandle(6)),
            2.0,
        );
        event.end_time = Some(3.0);
        let event = SemanticEvent::Grasp(event);
        assert_eq!(event.kind(), EventKind::Grasp);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "Grasp");
        assert_eq!(json["hand"]["id"], "RightHand");
        assert_eq!(json["object"]["class"], "Mug");
    }
}
