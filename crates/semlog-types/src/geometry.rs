//! Locations, rotations and poses.

use serde::{Deserialize, Serialize};

/// A 3-vector in host world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component (up).
    pub z: f64,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Build a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance to `other`.
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy))
    }
}

/// A rotation quaternion `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// The identity rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Build a quaternion from its components.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around the (unit) z axis.
    pub fn from_yaw(angle: f64) -> Self {
        let half = angle * 0.5;
        Self::new(0.0, 0.0, half.sin(), half.cos())
    }

    fn dot(self, other: Self) -> f64 {
        self.w.mul_add(
            other.w,
            self.z
                .mul_add(other.z, self.x.mul_add(other.x, self.y * other.y)),
        )
    }

    fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Smallest angle in radians rotating `self` onto `other`.
    ///
    /// `q` and `-q` describe the same rotation, so the absolute dot product
    /// is used. Degenerate (zero-length) quaternions yield `0.0`.
    pub fn angle_to(self, other: Self) -> f64 {
        let norms = self.norm() * other.norm();
        if norms <= f64::EPSILON {
            return 0.0;
        }
        let cos_half = (self.dot(other) / norms).abs().min(1.0);
        2.0 * cos_half.acos()
    }
}

/// Location and rotation of an entity at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// World location.
    pub location: Vec3,
    /// World rotation.
    pub rotation: Quat,
}

impl Pose {
    /// Build a pose from a location and rotation.
    pub const fn new(location: Vec3, rotation: Quat) -> Self {
        Self { location, rotation }
    }

    /// Pose at `location` with the identity rotation.
    pub const fn at(location: Vec3) -> Self {
        Self::new(location, Quat::IDENTITY)
    }
}

/// World pose of one named bone of a skeletal entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonePose {
    /// Bone name as exposed by the host skeleton.
    pub bone: String,
    /// World pose of the bone.
    pub pose: Pose,
}

impl BonePose {
    /// Name a bone pose.
    pub fn new(bone: impl Into<String>, pose: Pose) -> Self {
        Self {
            bone: bone.into(),
            pose,
        }
    }
}
