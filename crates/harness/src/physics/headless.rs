use std::collections::BTreeMap;

use glam::Vec3;
use tracing::debug;

use super::{
    BodyHandle, BodyKind, ColliderDesc, ColliderHandle, PhysicsError, PhysicsWorld, RigidBodyDesc,
};
use crate::math::Pose;

pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

#[derive(Debug)]
struct BodyRecord {
    desc: RigidBodyDesc,
    pose: Pose,
    linear_velocity: Vec3,
    colliders: Vec<ColliderHandle>,
}

#[derive(Debug)]
struct ColliderRecord {
    desc: ColliderDesc,
    body: BodyHandle,
}

/// In-memory physics world. Integrates gravity for free dynamic bodies and
/// nothing else; there is no contact solver.
#[derive(Debug)]
pub struct HeadlessPhysics {
    gravity: Vec3,
    next_body: u64,
    next_collider: u64,
    bodies: BTreeMap<BodyHandle, BodyRecord>,
    colliders: BTreeMap<ColliderHandle, ColliderRecord>,
}

impl Default for HeadlessPhysics {
    fn default() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }
}

impl HeadlessPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            next_body: 0,
            next_collider: 0,
            bodies: BTreeMap::new(),
            colliders: BTreeMap::new(),
        }
    }

    pub fn body_desc(&self, body: BodyHandle) -> Option<&RigidBodyDesc> {
        self.bodies.get(&body).map(|record| &record.desc)
    }

    pub fn colliders_of(&self, body: BodyHandle) -> &[ColliderHandle] {
        self.bodies
            .get(&body)
            .map(|record| record.colliders.as_slice())
            .unwrap_or(&[])
    }

    pub fn collision_event_subscribers(&self) -> usize {
        self.colliders
            .values()
            .filter(|record| record.desc.collision_events)
            .count()
    }
}

impl PhysicsWorld for HeadlessPhysics {
    fn create_rigid_body(&mut self, desc: RigidBodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body = self.next_body.saturating_add(1);
        self.bodies.insert(
            handle,
            BodyRecord {
                desc,
                pose: Pose::new(desc.translation, desc.rotation),
                linear_velocity: Vec3::ZERO,
                colliders: Vec::new(),
            },
        );
        handle
    }

    fn create_collider(
        &mut self,
        desc: ColliderDesc,
        body: BodyHandle,
    ) -> Result<ColliderHandle, PhysicsError> {
        let record = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        let handle = ColliderHandle(self.next_collider);
        self.next_collider = self.next_collider.saturating_add(1);
        record.colliders.push(handle);
        self.colliders.insert(handle, ColliderRecord { desc, body });
        Ok(handle)
    }

    fn remove_rigid_body(&mut self, body: BodyHandle) -> bool {
        let Some(record) = self.bodies.remove(&body) else {
            return false;
        };
        for collider in &record.colliders {
            self.colliders.remove(collider);
        }
        debug_assert!(self.colliders.values().all(|c| c.body != body));
        true
    }

    fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    fn contains_collider(&self, collider: ColliderHandle) -> bool {
        self.colliders.contains_key(&collider)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    fn body_pose(&self, body: BodyHandle) -> Option<Pose> {
        self.bodies.get(&body).map(|record| record.pose)
    }

    fn step(&mut self, dt_seconds: f32) {
        if dt_seconds <= 0.0 || !dt_seconds.is_finite() {
            debug!(dt_seconds, "physics_step_skipped");
            return;
        }
        for record in self.bodies.values_mut() {
            if record.desc.kind != BodyKind::Dynamic || record.desc.translations_locked {
                continue;
            }
            record.linear_velocity += self.gravity * dt_seconds;
            record.pose.position += record.linear_velocity * dt_seconds;
        }
    }
}
