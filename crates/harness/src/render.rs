//! Render-side bookkeeping: the mesh store the renderer draws from and the
//! body → mesh registry the per-frame sync step walks.

use std::collections::BTreeMap;

use crate::math::Transform3;
use crate::objects::ObjectId;
use crate::physics::{BodyHandle, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle {
    pub object: ObjectId,
    pub slot: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshNode {
    pub name: String,
    pub primitive: String,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub handle: MeshHandle,
    pub source_key: String,
    pub transform: Transform3,
    pub color: Option<u32>,
    pub nodes: Vec<MeshNode>,
}

impl Mesh {
    pub fn traverse_mut(&mut self, mut visit: impl FnMut(&mut MeshNode)) {
        for node in &mut self.nodes {
            visit(node);
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderScene {
    meshes: BTreeMap<MeshHandle, Mesh>,
}

impl RenderScene {
    /// Returns `false` and leaves the scene untouched if the handle is
    /// already present.
    pub fn add(&mut self, mesh: Mesh) -> bool {
        if self.meshes.contains_key(&mesh.handle) {
            return false;
        }
        self.meshes.insert(mesh.handle, mesh);
        true
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(&handle)
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(&handle)
    }

    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SceneRegistry {
    entries: BTreeMap<BodyHandle, MeshHandle>,
}

impl SceneRegistry {
    pub fn set(&mut self, body: BodyHandle, mesh: MeshHandle) -> Option<MeshHandle> {
        self.entries.insert(body, mesh)
    }

    pub fn delete(&mut self, body: BodyHandle) -> Option<MeshHandle> {
        self.entries.remove(&body)
    }

    pub fn get(&self, body: BodyHandle) -> Option<MeshHandle> {
        self.entries.get(&body).copied()
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.entries.contains_key(&body)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, MeshHandle)> + '_ {
        self.entries.iter().map(|(body, mesh)| (*body, *mesh))
    }
}

/// Copies every registered body's pose onto its mesh. Scale stays with the
/// mesh. Returns how many meshes were updated.
pub fn sync_transforms(
    registry: &SceneRegistry,
    physics: &dyn PhysicsWorld,
    scene: &mut RenderScene,
) -> usize {
    let mut synced = 0;
    for (body, mesh_handle) in registry.iter() {
        let (Some(pose), Some(mesh)) = (physics.body_pose(body), scene.mesh_mut(mesh_handle))
        else {
            continue;
        };
        mesh.transform = mesh.transform.with_pose(pose);
        synced += 1;
    }
    synced
}
