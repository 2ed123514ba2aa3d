//! Rigid-body world contract.
//!
//! Scene objects talk to the physics engine only through [`PhysicsWorld`].
//! Removing a rigid body removes every collider attached to it, so an object
//! only has to remember its body handle to tear itself down.

mod headless;

use glam::{Quat, Vec3};
use thiserror::Error;

use crate::math::Pose;

pub use headless::{HeadlessPhysics, DEFAULT_GRAVITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    KinematicPositionBased,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyDesc {
    pub kind: BodyKind,
    pub translation: Vec3,
    pub rotation: Quat,
    pub translations_locked: bool,
    pub rotations_locked: bool,
}

impl RigidBodyDesc {
    fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            translations_locked: false,
            rotations_locked: false,
        }
    }

    pub fn dynamic() -> Self {
        Self::new(BodyKind::Dynamic)
    }

    pub fn kinematic_position_based() -> Self {
        Self::new(BodyKind::KinematicPositionBased)
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn lock_translations(mut self) -> Self {
        self.translations_locked = true;
        self
    }

    pub fn lock_rotations(mut self) -> Self {
        self.rotations_locked = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Ball {
        radius: f32,
    },
    RoundCylinder {
        half_height: f32,
        radius: f32,
        border_radius: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderDesc {
    pub shape: ColliderShape,
    pub rotation: Quat,
    pub collision_events: bool,
}

impl ColliderDesc {
    fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            rotation: Quat::IDENTITY,
            collision_events: false,
        }
    }

    pub fn ball(radius: f32) -> Self {
        Self::new(ColliderShape::Ball { radius })
    }

    pub fn round_cylinder(half_height: f32, radius: f32, border_radius: f32) -> Self {
        Self::new(ColliderShape::RoundCylinder {
            half_height,
            radius,
            border_radius,
        })
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_collision_events(mut self) -> Self {
        self.collision_events = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("rigid body {0:?} is not registered in the physics world")]
    UnknownBody(BodyHandle),
}

pub trait PhysicsWorld {
    fn create_rigid_body(&mut self, desc: RigidBodyDesc) -> BodyHandle;
    fn create_collider(
        &mut self,
        desc: ColliderDesc,
        body: BodyHandle,
    ) -> Result<ColliderHandle, PhysicsError>;
    /// Removes the body and, transitively, its colliders. Returns `false` if
    /// the handle was not registered.
    fn remove_rigid_body(&mut self, body: BodyHandle) -> bool;
    fn contains_body(&self, body: BodyHandle) -> bool;
    fn contains_collider(&self, collider: ColliderHandle) -> bool;
    fn body_count(&self) -> usize;
    fn collider_count(&self) -> usize;
    fn body_pose(&self, body: BodyHandle) -> Option<Pose>;
    fn step(&mut self, dt_seconds: f32);
}
