use crate::math::Pose;
use crate::render::RenderScene;
use crate::resources::{ResourceError, ResourceResolver};

use super::{ObjectId, ObjectKind, ObjectOptions, SceneObject};

/// A scene object that only serves as a reference pose for a round.
#[derive(Debug)]
pub struct Goal {
    object: SceneObject,
}

impl Goal {
    pub fn gripper(id: ObjectId, pose: Pose) -> Self {
        Self::of_kind(id, ObjectKind::GripperGoal, pose)
    }

    pub fn ring(id: ObjectId, pose: Pose) -> Self {
        Self::of_kind(id, ObjectKind::Target, pose)
    }

    fn of_kind(id: ObjectId, kind: ObjectKind, pose: Pose) -> Self {
        debug_assert!(kind.is_goal_capable());
        Self {
            object: SceneObject::new(id, kind, ObjectOptions::default().with_pose(pose)),
        }
    }

    pub async fn fetch<R: ResourceResolver>(&mut self, resolver: &R) -> Result<(), ResourceError> {
        if self.object.is_fetched() {
            return Ok(());
        }
        self.object.resolve_meshes(resolver).await
    }

    /// The pose this goal was placed at.
    pub fn target_pose(&self) -> Pose {
        self.object.initial_transform().pose()
    }

    pub fn current_pose(&self, scene: &RenderScene) -> Pose {
        self.object.current_pose(scene)
    }

    pub fn object(&self) -> &SceneObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut SceneObject {
        &mut self.object
    }
}
