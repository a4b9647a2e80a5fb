//! Shared data model for the SemLog episodic logger.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! entities observed in the host simulation, their poses, the semantic events
//! derived from contact signals, and the world-state snapshots produced by the
//! background worker.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier newtypes (event ids, persistent entity ids, pair ids)
//! - [`entity`] -- Entities, host handles, entity kinds and canonical pair keys
//! - [`geometry`] -- Locations, rotations and poses
//! - [`event`] -- Contact, supported-by and grasp events
//! - [`snapshot`] -- Pose samples and world-state snapshots
//! - [`registry`] -- The [`EntityRegistry`] lookup seam and an in-memory registry
//! - [`time`] -- Injected clocks and the recurring timer used for periodic work
//!
//! [`EntityRegistry`]: registry::EntityRegistry

pub mod entity;
pub mod event;
pub mod geometry;
pub mod ids;
pub mod registry;
pub mod snapshot;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use entity::{Entity, EntityHandle, EntityKind, EntityRecord, PairKey};
pub use event::{
    ContactEvent, EventKind, GraspEvent, GraspGroup, SemanticEvent, SupportedByEvent,
};
pub use geometry::{BonePose, Pose, Quat, Vec3};
pub use ids::{EntityId, EventId, PairId};
pub use registry::{EntityRegistry, InMemoryRegistry, RegistryError};
pub use snapshot::{BoneSample, PoseSample, Snapshot};
pub use time::{Clock, ManualClock, RecurringTimer};
