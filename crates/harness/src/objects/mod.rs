//! Physics-bound props.
//!
//! A [`SceneObject`] pairs one render mesh with one rigid body (plus the
//! colliders its kind prescribes) and moves both in and out of the world
//! together:
//!
//! 1. [`SceneObject::fetch`] resolves the kind's asset into a mesh. This is
//!    the only suspension point and it touches no shared registry.
//! 2. [`SceneObject::load`] creates the body and colliders, registers the
//!    body → mesh pair and hands the mesh to the render scene.
//! 3. [`SceneObject::destruct`] undoes all of that and takes the mesh back,
//!    so the object can be loaded again later.
//!
//! `load` and `destruct` check every precondition before mutating anything.
//! A rejected call returns a [`LifecycleError`] and leaves the world as it
//! was.

mod goal;
mod kinds;

use glam::{Quat, Vec3};
use thiserror::Error;
use tracing::{debug, warn};

use crate::math::{Pose, Transform3};
use crate::physics::{BodyHandle, ColliderHandle, PhysicsError, PhysicsWorld};
use crate::render::{Mesh, MeshHandle, RenderScene, SceneRegistry};
use crate::resources::{ResourceError, ResourceResolver};

pub use goal::Goal;
pub use kinds::{ObjectKind, TARGET_COLOR, TORUS_RADIUS, TUBE_RADIUS, WATER_PARTICLE_SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Fetched,
    Loaded,
}

/// Overrides for a kind's default transform and colour.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectOptions {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    pub color: Option<u32>,
}

impl ObjectOptions {
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn colored(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_pose(self, pose: Pose) -> Self {
        self.at(pose.position).rotated(pose.orientation)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("object {id:?} was loaded before its assets were fetched")]
    NotFetched { id: ObjectId },
    #[error("object {id:?} has already been fetched")]
    AlreadyFetched { id: ObjectId },
    #[error("object {id:?} is already loaded")]
    AlreadyLoaded { id: ObjectId },
    #[error("object {id:?} is not loaded")]
    NotLoaded { id: ObjectId },
    #[error("mesh {handle:?} of object {id:?} is already in the render scene")]
    MeshConflict { id: ObjectId, handle: MeshHandle },
    #[error("physics world rejected object {id:?}: {source}")]
    Physics {
        id: ObjectId,
        #[source]
        source: PhysicsError,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Borrowed view of the shared registries an object mutates on load and
/// destruct.
pub struct ObjectContext<'a> {
    pub physics: &'a mut dyn PhysicsWorld,
    pub scene: &'a mut RenderScene,
    pub registry: &'a mut SceneRegistry,
}

#[derive(Debug)]
pub struct SceneObject {
    id: ObjectId,
    kind: ObjectKind,
    initial: Transform3,
    color: Option<u32>,
    state: LifecycleState,
    // Held here while unloaded; owned by the render scene while loaded.
    meshes: Vec<Mesh>,
    mesh_handles: Vec<MeshHandle>,
    rigid_body: Option<BodyHandle>,
    colliders: Vec<ColliderHandle>,
}

impl SceneObject {
    pub fn new(id: ObjectId, kind: ObjectKind, options: ObjectOptions) -> Self {
        let defaults = kind.default_transform();
        let initial = Transform3 {
            translation: options.position.unwrap_or(defaults.translation),
            rotation: options.rotation.unwrap_or(defaults.rotation),
            scale: options.scale.unwrap_or(defaults.scale),
        };
        Self {
            id,
            kind,
            initial,
            color: options.color.or(kind.default_color()),
            state: LifecycleState::Constructed,
            meshes: Vec::new(),
            mesh_handles: Vec::new(),
            rigid_body: None,
            colliders: Vec::new(),
        }
    }

    /// Constructs and fetches in one step.
    pub async fn init<R: ResourceResolver>(
        id: ObjectId,
        kind: ObjectKind,
        options: ObjectOptions,
        resolver: &R,
    ) -> Result<Self, ResourceError> {
        let mut object = Self::new(id, kind, options);
        object.resolve_meshes(resolver).await?;
        Ok(object)
    }

    pub async fn fetch<R: ResourceResolver>(&mut self, resolver: &R) -> Result<(), FetchError> {
        if self.state != LifecycleState::Constructed {
            return Err(LifecycleError::AlreadyFetched { id: self.id }.into());
        }
        self.resolve_meshes(resolver).await?;
        Ok(())
    }

    async fn resolve_meshes<R: ResourceResolver>(
        &mut self,
        resolver: &R,
    ) -> Result<(), ResourceError> {
        let graph = resolver.resolve(self.kind.asset_key()).await?;
        let handle = MeshHandle {
            object: self.id,
            slot: 0,
        };
        let mut mesh = Mesh {
            handle,
            source_key: graph.key,
            transform: self.initial,
            color: self.color,
            nodes: graph.nodes,
        };
        mesh.traverse_mut(|node| {
            node.cast_shadow = true;
            node.receive_shadow = true;
        });
        self.meshes = vec![mesh];
        self.mesh_handles = vec![handle];
        self.state = LifecycleState::Fetched;
        debug!(
            object = self.id.0,
            kind = self.kind.type_tag(),
            digest = %graph.digest_sha256_hex,
            "object_fetched"
        );
        Ok(())
    }

    pub fn load(&mut self, ctx: ObjectContext<'_>) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Constructed => return Err(LifecycleError::NotFetched { id: self.id }),
            LifecycleState::Loaded => return Err(LifecycleError::AlreadyLoaded { id: self.id }),
            LifecycleState::Fetched => {}
        }
        let primary = self
            .mesh_handles
            .first()
            .copied()
            .ok_or(LifecycleError::NotFetched { id: self.id })?;
        if let Some(handle) = self
            .mesh_handles
            .iter()
            .copied()
            .find(|handle| ctx.scene.contains(*handle))
        {
            return Err(LifecycleError::MeshConflict {
                id: self.id,
                handle,
            });
        }

        let body = ctx
            .physics
            .create_rigid_body(self.kind.body_desc(&self.initial));
        let mut colliders = Vec::new();
        for desc in self.kind.collider_descs(&self.initial) {
            match ctx.physics.create_collider(desc, body) {
                Ok(collider) => colliders.push(collider),
                Err(source) => {
                    ctx.physics.remove_rigid_body(body);
                    return Err(LifecycleError::Physics {
                        id: self.id,
                        source,
                    });
                }
            }
        }

        ctx.registry.set(body, primary);
        for mut mesh in self.meshes.drain(..) {
            // Start where the body spawns, not where the last sync left it.
            mesh.transform = self.initial;
            ctx.scene.add(mesh);
        }
        self.rigid_body = Some(body);
        self.colliders = colliders;
        self.state = LifecycleState::Loaded;
        debug!(
            object = self.id.0,
            kind = self.kind.type_tag(),
            body = body.0,
            collider_count = self.colliders.len(),
            "object_loaded"
        );
        Ok(())
    }

    pub fn destruct(&mut self, ctx: ObjectContext<'_>) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Loaded {
            return Err(LifecycleError::NotLoaded { id: self.id });
        }
        let body = self
            .rigid_body
            .take()
            .ok_or(LifecycleError::NotLoaded { id: self.id })?;

        for handle in &self.mesh_handles {
            match ctx.scene.remove(*handle) {
                Some(mesh) => self.meshes.push(mesh),
                None => warn!(
                    object = self.id.0,
                    slot = handle.slot,
                    "object_mesh_missing_from_scene"
                ),
            }
        }
        ctx.registry.delete(body);
        if !ctx.physics.remove_rigid_body(body) {
            warn!(object = self.id.0, body = body.0, "object_body_missing");
        }
        self.colliders.clear();
        self.state = LifecycleState::Fetched;
        debug!(
            object = self.id.0,
            kind = self.kind.type_tag(),
            "object_destructed"
        );
        Ok(())
    }

    /// Pose of the primary mesh: the synced render pose while loaded, the
    /// spawn pose otherwise.
    pub fn current_pose(&self, scene: &RenderScene) -> Pose {
        if self.state == LifecycleState::Loaded {
            if let Some(mesh) = self
                .mesh_handles
                .first()
                .and_then(|handle| scene.mesh(*handle))
            {
                return mesh.transform.pose();
            }
        }
        self.meshes
            .first()
            .map(|mesh| mesh.transform.pose())
            .unwrap_or_else(|| self.initial.pose())
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LifecycleState::Loaded
    }

    pub fn is_fetched(&self) -> bool {
        self.state != LifecycleState::Constructed
    }

    pub fn initial_transform(&self) -> &Transform3 {
        &self.initial
    }

    pub fn color(&self) -> Option<u32> {
        self.color
    }

    pub fn rigid_body(&self) -> Option<BodyHandle> {
        self.rigid_body
    }

    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    pub fn mesh_handles(&self) -> &[MeshHandle] {
        &self.mesh_handles
    }

    /// Meshes currently held by the object (empty while loaded).
    pub fn staged_meshes(&self) -> &[Mesh] {
        &self.meshes
    }
}
