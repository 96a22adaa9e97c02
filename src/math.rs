//! Math types for PetalSonic

pub use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn distance_squared(&self, position: Vec3) -> f32 {
        self.position.distance_squared(position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Spatial attributes pushed to a backend instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attributes3D {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Attributes3D {
    /// Attributes for a stationary point with the default orientation.
    pub fn at_position(position: Vec3) -> Self {
        Self::from_pose(&Pose::from_position(position))
    }

    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            position: pose.position,
            velocity: Vec3::ZERO,
            forward: pose.forward(),
            up: pose.up(),
        }
    }
}

impl Default for Attributes3D {
    fn default() -> Self {
        Self::at_position(Vec3::ZERO)
    }
}
