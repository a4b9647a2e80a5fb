//! Geometric support test seam.
//!
//! Contact signals say two entities touch; they do not say which one is
//! resting on which. That decision is delegated to a [`SupportTest`]
//! supplied by the host. [`VerticalSupportTest`] is the stock heuristic: the
//! supported entity sits above the supporting one and both move together
//! vertically.

use std::sync::Arc;

use semlog_types::{Entity, EntityHandle, Vec3};

/// Decides whether one entity is currently resting on another.
pub trait SupportTest {
    /// Whether `supported` is held up by `supporting` right now.
    fn is_supported_by(&self, supported: &Entity, supporting: &Entity) -> bool;
}

/// Location and linear velocity of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    /// World location.
    pub location: Vec3,
    /// Linear velocity in world units per second.
    pub velocity: Vec3,
}

/// Host-side source of live kinematic state.
pub trait KinematicsSource: Send + Sync {
    /// Current kinematics for `handle`, if the host still knows it.
    fn kinematics(&self, handle: EntityHandle) -> Option<Kinematics>;
}

impl<K: KinematicsSource + ?Sized> KinematicsSource for Arc<K> {
    fn kinematics(&self, handle: EntityHandle) -> Option<Kinematics> {
        (**self).kinematics(handle)
    }
}

/// Supported when above the supporter and vertically at rest relative to it.
#[derive(Debug, Clone)]
pub struct VerticalSupportTest<K> {
    source: K,
    max_relative_vertical_speed: f64,
}

impl<K: KinematicsSource> VerticalSupportTest<K> {
    /// Build the test over `source`.
    pub const fn new(source: K, max_relative_vertical_speed: f64) -> Self {
        Self {
            source,
            max_relative_vertical_speed,
        }
    }
}

impl<K: KinematicsSource> SupportTest for VerticalSupportTest<K> {
    fn is_supported_by(&self, supported: &Entity, supporting: &Entity) -> bool {
        let (Some(upper), Some(lower)) = (
            self.source.kinematics(supported.handle),
            self.source.kinematics(supporting.handle),
        ) else {
            return false;
        };

        let above = upper.location.z > lower.location.z;
        let relative_vz = (upper.velocity.z - lower.velocity.z).abs();
        above && relative_vz <= self.max_relative_vertical_speed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    struct Fixed(BTreeMap<EntityHandle, Kinematics>);

    impl KinematicsSource for Fixed {
        fn kinematics(&self, handle: EntityHandle) -> Option<Kinematics> {
            self.0.get(&handle).copied()
        }
    }

    fn scene(cup_z: f64, cup_vz: f64) -> VerticalSupportTest<Fixed> {
        let mut map = BTreeMap::new();
        map.insert(
            EntityHandle(1),
            Kinematics {
                location: Vec3::new(0.0, 0.0, cup_z),
                velocity: Vec3::new(0.0, 0.0, cup_vz),
            },
        );
        map.insert(
            EntityHandle(2),
            Kinematics {
                location: Vec3::new(0.0, 0.0, 80.0),
                velocity: Vec3::ZERO,
            },
        );
        VerticalSupportTest::new(Fixed(map), 0.5)
    }

    #[test]
    fn resting_cup_is_supported_by_table() {
        let cup = Entity::new("Cup", "Cup", EntityHandle(1));
        let table = Entity::new("Table", "Table", EntityHandle(2));
        let test = scene(85.0, 0.1);
        assert!(test.is_supported_by(&cup, &table));
        assert!(!test.is_supported_by(&table, &cup));
    }

    #[test]
    fn falling_cup_is_not_supported() {
        let cup = Entity::new("Cup", "Cup", EntityHandle(1));
        let table = Entity::new("Table", "Table", EntityHandle(2));
        assert!(!scene(85.0, -30.0).is_supported_by(&cup, &table));
    }

    #[test]
    fn unknown_entities_are_never_supported() {
        let ghost = Entity::new("Ghost", "Ghost", EntityHandle(9));
        let table = Entity::new("Table", "Table", EntityHandle(2));
        assert!(!scene(85.0, 0.0).is_supported_by(&ghost, &table));
    }
}
