//! Scene state rebuilt from trace records.
//!
//! Stands in for the host physics engine: the snapshot worker reads poses
//! from it on its own thread while the replay loop applies pose records, so
//! the body table sits behind a read-write lock.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use semlog_events::{Kinematics, KinematicsSource};
use semlog_types::{BonePose, EntityHandle, Pose, Quat, Vec3};
use semlog_world::PoseSource;

#[derive(Debug, Clone, Default)]
struct Body {
    pose: Pose,
    velocity: Vec3,
    bones: Vec<BonePose>,
}

/// Latest known pose and velocity of every entity in the trace.
#[derive(Debug, Default)]
pub struct SceneState {
    bodies: RwLock<BTreeMap<EntityHandle, Body>>,
}

impl SceneState {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an entity at rest.
    pub fn spawn(&self, handle: EntityHandle, pose: Pose) {
        self.bodies.write().insert(
            handle,
            Body {
                pose,
                velocity: Vec3::ZERO,
                bones: Vec::new(),
            },
        );
    }

    /// Apply a pose update. A missing rotation or skeleton keeps the
    /// previous one.
    pub fn update(
        &self,
        handle: EntityHandle,
        location: Vec3,
        rotation: Option<Quat>,
        velocity: Vec3,
        bones: Option<Vec<BonePose>>,
    ) {
        let mut bodies = self.bodies.write();
        let body = bodies.entry(handle).or_default();
        body.pose.location = location;
        if let Some(rotation) = rotation {
            body.pose.rotation = rotation;
        }
        body.velocity = velocity;
        if let Some(bones) = bones {
            body.bones = bones;
        }
    }
}

impl PoseSource for SceneState {
    fn pose(&self, handle: EntityHandle) -> Option<Pose> {
        self.bodies.read().get(&handle).map(|b| b.pose)
    }

    fn bone_poses(&self, handle: EntityHandle) -> Vec<BonePose> {
        self.bodies
            .read()
            .get(&handle)
            .map(|b| b.bones.clone())
            .unwrap_or_default()
    }
}

impl KinematicsSource for SceneState {
    fn kinematics(&self, handle: EntityHandle) -> Option<Kinematics> {
        self.bodies.read().get(&handle).map(|b| Kinematics {
            location: b.pose.location,
            velocity: b.velocity,
        })
    }
}
