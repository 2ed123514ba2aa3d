use glam::{EulerRot, Quat, Vec3};

/// Position plus orientation. Scale never takes part in pose comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_euler_xyz(position: Vec3, x: f32, y: f32, z: f32) -> Self {
        Self::new(position, euler_xyz(x, y, z))
    }

    /// `"x y z "`, trailing space included; this is the layout downstream
    /// log readers split on.
    pub fn format_position(&self) -> String {
        format!(
            "{} {} {} ",
            self.position.x, self.position.y, self.position.z
        )
    }

    pub fn format_orientation(&self) -> String {
        format!(
            "{} {} {} {}",
            self.orientation.x, self.orientation.y, self.orientation.z, self.orientation.w
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3 {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3 {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform3 {
    pub fn pose(&self) -> Pose {
        Pose::new(self.translation, self.rotation)
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.translation = pose.position;
        self.rotation = pose.orientation;
        self
    }
}

/// Intrinsic X, then Y, then Z rotation (angles in radians).
pub fn euler_xyz(x: f32, y: f32, z: f32) -> Quat {
    Quat::from_euler(EulerRot::XYZ, x, y, z)
}
