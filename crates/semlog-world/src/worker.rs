//! Delta-filtered world-state pass.
//!
//! [`WorldStateWorker`] owns the tracked entity set and each entity's
//! last-logged pose. One [`run_once`](WorldStateWorker::run_once) call is one
//! snapshot cycle: entities that moved or turned beyond the configured
//! thresholds are sampled and their cache entry updated, everything else is
//! skipped. An entity that has never been logged is always sampled, which
//! makes the first cycle a full baseline.
//!
//! Skeletal entities are filtered per bone: each bone keeps its own
//! last-logged pose, and a sample carries only the bones that moved. A
//! skeletal entity is sampled when its root or any bone crossed a threshold.

use std::collections::BTreeMap;
use std::sync::Arc;

use semlog_types::{
    BonePose, BoneSample, EntityHandle, EntityId, EntityKind, EntityRecord, Pose, PoseSample,
    Snapshot,
};
use serde::Deserialize;
use tracing::{debug, trace};

/// World-state worker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldStateConfig {
    /// Minimum translation (world units) before an entity is logged again.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,

    /// Minimum rotation in radians before an entity is logged again.
    #[serde(default = "default_rotation_step")]
    pub rotation_step: f64,

    /// Seconds between cycles. Zero runs a cycle on every tick.
    #[serde(default)]
    pub update_rate: f64,
}

impl Default for WorldStateConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            rotation_step: default_rotation_step(),
            update_rate: 0.0,
        }
    }
}

const fn default_distance_threshold() -> f64 {
    0.5
}

const fn default_rotation_step() -> f64 {
    0.1
}

/// Host-side source of live entity poses.
pub trait PoseSource: Send + Sync {
    /// Current world pose of `handle`, or `None` if the host no longer has
    /// the entity.
    fn pose(&self, handle: EntityHandle) -> Option<Pose>;

    /// World poses of the bones of a skeletal entity. Empty when the host
    /// exposes no skeleton for `handle`.
    fn bone_poses(&self, _handle: EntityHandle) -> Vec<BonePose> {
        Vec::new()
    }
}

impl<P: PoseSource + ?Sized> PoseSource for Arc<P> {
    fn pose(&self, handle: EntityHandle) -> Option<Pose> {
        (**self).pose(handle)
    }

    fn bone_poses(&self, handle: EntityHandle) -> Vec<BonePose> {
        (**self).bone_poses(handle)
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    record: EntityRecord,
    last_logged: Option<Pose>,
    bones: BTreeMap<String, Pose>,
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    distance_squared: f64,
    rotation_step: f64,
}

impl Thresholds {
    /// Whether `current` should be logged given the last logged pose.
    fn exceeded(self, last: Option<Pose>, current: Pose) -> bool {
        last.is_none_or(|last| {
            last.location.distance_squared(current.location) > self.distance_squared
                || last.rotation.angle_to(current.rotation) > self.rotation_step
        })
    }
}

/// Tracked entity set plus the delta-filtering pass over it.
#[derive(Debug)]
pub struct WorldStateWorker<P> {
    thresholds: Thresholds,
    source: P,
    tracked: Vec<Tracked>,
    cycles: u64,
}

impl<P: PoseSource> WorldStateWorker<P> {
    /// Create a worker with an empty entity set.
    pub fn new(config: &WorldStateConfig, source: P) -> Self {
        Self {
            thresholds: Thresholds {
                distance_squared: config.distance_threshold * config.distance_threshold,
                rotation_step: config.rotation_step,
            },
            source,
            tracked: Vec::new(),
            cycles: 0,
        }
    }

    /// Create a worker tracking `records`.
    pub fn with_entities(
        config: &WorldStateConfig,
        source: P,
        records: impl IntoIterator<Item = EntityRecord>,
    ) -> Self {
        let mut worker = Self::new(config, source);
        for record in records {
            worker.track(record);
        }
        worker
    }

    /// Start tracking an entity. Its first sighting is logged
    /// unconditionally. Returns `false` if the id is already tracked.
    pub fn track(&mut self, record: EntityRecord) -> bool {
        if self.is_tracked(&record.entity.id) {
            trace!(entity = %record.entity.id, "entity already tracked");
            return false;
        }
        debug!(entity = %record.entity.id, kind = ?record.kind, "tracking entity");
        self.tracked.push(Tracked {
            record,
            last_logged: None,
            bones: BTreeMap::new(),
        });
        true
    }

    /// Whether an entity with `id` is tracked.
    pub fn is_tracked(&self, id: &EntityId) -> bool {
        self.tracked.iter().any(|t| &t.record.entity.id == id)
    }

    /// Drop entities that can never move. Returns the number removed.
    pub fn remove_static_items(&mut self) -> usize {
        let before = self.tracked.len();
        self.tracked.retain(|t| t.record.kind.is_movable());
        let removed = before.saturating_sub(self.tracked.len());
        debug!(removed, remaining = self.tracked.len(), "static entities pruned");
        removed
    }

    /// Run one snapshot cycle stamped with `timestamp`.
    pub fn run_once(&mut self, timestamp: f64) -> Snapshot {
        let mut snapshot = Snapshot::new(timestamp);
        let thresholds = self.thresholds;

        for tracked in &mut self.tracked {
            let entity = &tracked.record.entity;
            let Some(current) = self.source.pose(entity.handle) else {
                trace!(entity = %entity.id, "no pose available, skipping");
                continue;
            };

            let root_changed = thresholds.exceeded(tracked.last_logged, current);
            let bones = if tracked.record.kind == EntityKind::Skeletal {
                changed_bones(
                    &mut tracked.bones,
                    self.source.bone_poses(entity.handle),
                    thresholds,
                )
            } else {
                Vec::new()
            };
            if !root_changed && bones.is_empty() {
                continue;
            }

            snapshot.samples.push(PoseSample {
                entity_id: entity.id.clone(),
                class: entity.class.clone(),
                location: current.location,
                rotation: current.rotation,
                bones,
            });
            tracked.last_logged = Some(current);
        }

        self.cycles = self.cycles.saturating_add(1);
        trace!(
            timestamp,
            samples = snapshot.len(),
            tracked = self.tracked.len(),
            "snapshot cycle complete"
        );
        snapshot
    }

    /// Number of tracked entities.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Cycles run so far.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Filter `current` bone poses against the per-bone cache, updating it for
/// every bone that is returned.
fn changed_bones(
    cache: &mut BTreeMap<String, Pose>,
    current: Vec<BonePose>,
    thresholds: Thresholds,
) -> Vec<BoneSample> {
    let mut changed = Vec::new();
    for BonePose { bone, pose } in current {
        if !thresholds.exceeded(cache.get(&bone).copied(), pose) {
            continue;
        }
        cache.insert(bone.clone(), pose);
        changed.push(BoneSample {
            bone,
            location: pose.location,
            rotation: pose.rotation,
        });
    }
    changed
}
