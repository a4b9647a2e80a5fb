//! Recorded simulation trace format.
//!
//! One JSON object per line, discriminated by `type`:
//!
//! ```text
//! {"type":"entity","handle":1,"id":"Cup","class":"Cup","kind":"dynamic","location":{"x":0,"y":0,"z":85}}
//! {"type":"pose","time":0.5,"handle":1,"location":{"x":1,"y":0,"z":85}}
//! {"type":"pose","time":0.5,"handle":3,"location":{"x":0,"y":0,"z":99},"bones":[{"bone":"thumb_03","location":{"x":1,"y":0,"z":99}}]}
//! {"type":"overlap_begin","time":0.0,"owner":1,"other":2,"other_is_contact_area":false}
//! {"type":"overlap_end","time":1.2,"owner":1,"other":2}
//! {"type":"grasp_begin","time":1.3,"hand":3,"object":1,"shape":"thumb_03","group":"A"}
//! {"type":"grasp_end","time":2.0,"hand":3,"object":1,"shape":"thumb_03","group":"A"}
//! {"type":"hand_released","time":2.5,"hand":3}
//! {"type":"tick","time":0.016}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use anyhow::Context;
use semlog_types::{BonePose, EntityHandle, EntityKind, GraspGroup, Pose, Quat, Vec3};
use serde::Deserialize;

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A tagged entity appears in the scene.
    Entity(EntityRecordLine),
    /// An entity moved.
    Pose(PoseLine),
    /// Two entities started overlapping.
    OverlapBegin(OverlapLine),
    /// Two entities stopped overlapping.
    OverlapEnd(OverlapLine),
    /// A finger shape started touching an object.
    GraspBegin(GraspLine),
    /// A finger shape stopped touching an object.
    GraspEnd(GraspLine),
    /// The host stopped reporting finger overlaps for a hand.
    HandReleased {
        /// Simulation time in seconds.
        time: f64,
        /// The released hand.
        hand: EntityHandle,
    },
    /// One simulation frame elapsed.
    Tick {
        /// Simulation time in seconds.
        time: f64,
    },
}

impl TraceRecord {
    /// Simulation time carried by the record, if any.
    pub const fn time(&self) -> Option<f64> {
        match self {
            Self::Entity(_) => None,
            Self::Pose(line) => Some(line.time),
            Self::OverlapBegin(line) | Self::OverlapEnd(line) => Some(line.time),
            Self::GraspBegin(line) | Self::GraspEnd(line) => Some(line.time),
            Self::HandReleased { time, .. } | Self::Tick { time } => Some(*time),
        }
    }
}

/// Payload of an `entity` record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityRecordLine {
    /// Host handle.
    pub handle: EntityHandle,
    /// Persistent id.
    pub id: String,
    /// Semantic class.
    pub class: String,
    /// Mobility category.
    #[serde(default = "default_kind")]
    pub kind: EntityKind,
    /// Initial location.
    #[serde(default)]
    pub location: Vec3,
    /// Initial rotation.
    #[serde(default)]
    pub rotation: Quat,
}

const fn default_kind() -> EntityKind {
    EntityKind::Dynamic
}

/// Payload of a `pose` record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoseLine {
    /// Simulation time in seconds.
    pub time: f64,
    /// Host handle.
    pub handle: EntityHandle,
    /// New location.
    pub location: Vec3,
    /// New rotation; unchanged when absent.
    #[serde(default)]
    pub rotation: Option<Quat>,
    /// Linear velocity; zero when absent.
    #[serde(default)]
    pub velocity: Vec3,
    /// Bone poses of a skeletal entity; unchanged when absent.
    #[serde(default)]
    pub bones: Option<Vec<BoneLine>>,
}

/// One bone of a `pose` record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoneLine {
    /// Bone name.
    pub bone: String,
    /// World location.
    pub location: Vec3,
    /// World rotation; identity when absent.
    #[serde(default)]
    pub rotation: Quat,
}

impl From<BoneLine> for BonePose {
    fn from(line: BoneLine) -> Self {
        Self::new(line.bone, Pose::new(line.location, line.rotation))
    }
}

/// Payload of `grasp_begin` and `grasp_end` records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraspLine {
    /// Simulation time in seconds.
    pub time: f64,
    /// Hand carrying the finger shape.
    pub hand: EntityHandle,
    /// Entity the shape touched.
    pub object: EntityHandle,
    /// Finger shape name.
    pub shape: String,
    /// Side of the hand the shape belongs to.
    pub group: GraspGroup,
}

/// Payload of `overlap_begin` and `overlap_end` records.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OverlapLine {
    /// Simulation time in seconds.
    pub time: f64,
    /// Entity owning the overlap area.
    pub owner: EntityHandle,
    /// Entity entering or leaving it.
    pub other: EntityHandle,
    /// Whether `other` has a contact area of its own.
    #[serde(default)]
    pub other_is_contact_area: bool,
}

/// Parse a whole trace from text.
pub fn parse(text: &str) -> anyhow::Result<Vec<TraceRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid trace record on line {}", index.saturating_add(1)))
        })
        .collect()
}

/// Read and parse the trace file at `path`.
pub fn load(path: &Path) -> anyhow::Result<Vec<TraceRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse(&text)
}
