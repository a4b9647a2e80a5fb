//! Loggable entities and canonical pair keys.
//!
//! The core never owns entity lifetime. Hosts hand out opaque
//! [`EntityHandle`] values and the registry maps them to the semantic
//! [`Entity`] description (persistent id plus semantic class).

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Opaque reference to an actor or component owned by the host simulation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

impl core::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A semantically tagged entity.
///
/// Only the id and class are persisted. The handle is meaningful to the
/// running host alone and deserializes as the default handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Persistent unique id.
    pub id: EntityId,
    /// Semantic class (e.g. `"Cup"`, `"Table"`).
    pub class: String,
    /// Host handle the entity was resolved from.
    #[serde(skip)]
    pub handle: EntityHandle,
}

impl Entity {
    /// Build an entity from its parts.
    pub fn new(id: impl Into<String>, class: impl Into<String>, handle: EntityHandle) -> Self {
        Self {
            id: EntityId::new(id),
            class: class.into(),
            handle,
        }
    }
}

/// How an entity participates in world-state logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Never moves. Logged once in the initial snapshot, then pruned.
    Static,
    /// Rigid body that may move during the episode.
    Dynamic,
    /// Skeletal actor (e.g. a hand or a robot).
    Skeletal,
}

impl EntityKind {
    /// Whether the entity is expected to move after the initial snapshot.
    pub const fn is_movable(self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// An entity together with its world-state kind, as stored by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// The semantic entity.
    pub entity: Entity,
    /// World-state logging kind.
    pub kind: EntityKind,
}

/// Order-independent key for an unordered entity pair.
///
/// The lexicographically smaller id is always stored first, so `{A, B}` and
/// `{B, A}` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    first: EntityId,
    second: EntityId,
}

impl PairKey {
    /// Build the canonical key for two entity ids.
    pub fn new(a: &EntityId, b: &EntityId) -> Self {
        if a <= b {
            Self {
                first: a.clone(),
                second: b.clone(),
            }
        } else {
            Self {
                first: b.clone(),
                second: a.clone(),
            }
        }
    }

    /// The smaller id of the pair.
    pub const fn first(&self) -> &EntityId {
        &self.first
    }

    /// The larger id of the pair.
    pub const fn second(&self) -> &EntityId {
        &self.second
    }

    /// Whether both ids are the same entity.
    pub fn is_self_pair(&self) -> bool {
        self.first == self.second
    }
}

impl core::fmt::Display for PairKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}|{}", self.first, self.second)
    }
}
