//! World-state snapshots.

use serde::{Deserialize, Serialize};

use crate::geometry::{Quat, Vec3};
use crate::ids::EntityId;

/// Pose of one entity captured during a snapshot cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    /// Persistent entity id.
    pub entity_id: EntityId,
    /// Semantic class of the entity.
    pub class: String,
    /// World location.
    pub location: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Bones of a skeletal entity that moved beyond threshold. Empty for
    /// rigid entities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bones: Vec<BoneSample>,
}

/// Pose of one bone captured during a snapshot cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneSample {
    /// Bone name.
    pub bone: String,
    /// World location.
    pub location: Vec3,
    /// World rotation.
    pub rotation: Quat,
}

/// One delta-filtered batch of entity poses.
///
/// Holds at most one sample per entity id. Produced once per worker cycle,
/// written once and then discarded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation time the cycle was requested at (seconds).
    pub timestamp: f64,
    /// Entities whose pose changed beyond threshold, in registration order.
    pub samples: Vec<PoseSample>,
}

impl Snapshot {
    /// Create an empty snapshot for `timestamp`.
    pub const fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            samples: Vec::new(),
        }
    }

    /// Number of pose samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no entity qualified this cycle.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Look up the sample for an entity.
    pub fn sample(&self, id: &EntityId) -> Option<&PoseSample> {
        self.samples.iter().find(|s| &s.entity_id == id)
    }
}

impl PoseSample {
    /// Look up a logged bone by name.
    pub fn bone(&self, name: &str) -> Option<&BoneSample> {
        self.bones.iter().find(|b| b.bone == name)
    }
}
