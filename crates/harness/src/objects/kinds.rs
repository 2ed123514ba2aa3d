use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use crate::math::{euler_xyz, Transform3};
use crate::physics::{ColliderDesc, RigidBodyDesc};

const TARGET_ASSET: &str = "models/target.xml";
const WATER_PARTICLE_ASSET: &str = "models/water_particle.xml";
const GRIPPER_GOAL_ASSET: &str = "models/gripper_goal.xml";

pub const TORUS_RADIUS: f32 = 0.05;
pub const TUBE_RADIUS: f32 = 0.005;
pub const TARGET_COLOR: u32 = 0xFF0000;
pub const WATER_PARTICLE_SCALE: f32 = 0.15;
const WATER_PARTICLE_RADIUS_PER_SCALE: f32 = 0.1;

/// Closed set of prop kinds. Each kind fixes its asset, its default
/// transform, its body policy and its collider set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Ring target, pinned in place.
    Target,
    /// Free-falling droplet that reports collisions.
    WaterParticle,
    /// Gripper silhouette used as a reference pose; never collides.
    GripperGoal,
}

impl ObjectKind {
    pub fn type_tag(self) -> &'static str {
        match self {
            ObjectKind::Target => "target",
            ObjectKind::WaterParticle => "water_particle",
            ObjectKind::GripperGoal => "gripper_goal",
        }
    }

    pub fn asset_key(self) -> &'static str {
        match self {
            ObjectKind::Target => TARGET_ASSET,
            ObjectKind::WaterParticle => WATER_PARTICLE_ASSET,
            ObjectKind::GripperGoal => GRIPPER_GOAL_ASSET,
        }
    }

    pub fn is_goal_capable(self) -> bool {
        matches!(self, ObjectKind::Target | ObjectKind::GripperGoal)
    }

    pub(crate) fn default_transform(self) -> Transform3 {
        match self {
            ObjectKind::Target => Transform3 {
                rotation: euler_xyz(FRAC_PI_2, 0.0, 0.0),
                ..Transform3::default()
            },
            ObjectKind::WaterParticle => Transform3 {
                scale: Vec3::splat(WATER_PARTICLE_SCALE),
                ..Transform3::default()
            },
            ObjectKind::GripperGoal => Transform3::default(),
        }
    }

    pub(crate) fn default_color(self) -> Option<u32> {
        match self {
            ObjectKind::Target => Some(TARGET_COLOR),
            ObjectKind::WaterParticle | ObjectKind::GripperGoal => None,
        }
    }

    pub(crate) fn body_desc(self, initial: &Transform3) -> RigidBodyDesc {
        let desc = match self {
            ObjectKind::Target => RigidBodyDesc::dynamic().lock_translations().lock_rotations(),
            ObjectKind::WaterParticle => RigidBodyDesc::dynamic(),
            ObjectKind::GripperGoal => RigidBodyDesc::kinematic_position_based(),
        };
        desc.with_translation(initial.translation)
            .with_rotation(initial.rotation)
    }

    pub(crate) fn collider_descs(self, initial: &Transform3) -> Vec<ColliderDesc> {
        match self {
            // Torus approximated by a flat rounded cylinder spanning the ring.
            ObjectKind::Target => vec![ColliderDesc::round_cylinder(
                TUBE_RADIUS / 2.0,
                (TORUS_RADIUS + TUBE_RADIUS / 2.0) / 3.0,
                TUBE_RADIUS / 2.0,
            )
            .with_rotation(initial.rotation)],
            ObjectKind::WaterParticle => vec![ColliderDesc::ball(
                WATER_PARTICLE_RADIUS_PER_SCALE * initial.scale.x,
            )
            .with_collision_events()],
            ObjectKind::GripperGoal => Vec::new(),
        }
    }
}
