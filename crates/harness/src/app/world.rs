use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::objects::{
    LifecycleError, LifecycleState, ObjectContext, ObjectId, ObjectIdAllocator, SceneObject,
};
use crate::physics::{HeadlessPhysics, PhysicsWorld};
use crate::render::{self, RenderScene, SceneRegistry};
use crate::task::TaskError;
use crate::ui::UiLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioCommand {
    Continue,
    Finish,
}

/// One session of simulation content driven by the fixed-step loop.
pub trait Scenario {
    fn load(&mut self, world: &mut SimWorld) -> Result<(), TaskError>;
    fn update(
        &mut self,
        time_seconds: f64,
        fixed_dt_seconds: f32,
        world: &mut SimWorld,
    ) -> Result<ScenarioCommand, TaskError>;
    fn unload(&mut self, world: &mut SimWorld) -> Result<(), TaskError>;
    fn debug_title(&self, _world: &SimWorld) -> Option<String> {
        None
    }
}

/// Owns every registry a [`SceneObject`] touches, plus the props the world
/// itself manages.
///
/// Props are spawned and despawned through deferred queues that
/// [`SimWorld::apply_pending`] drains once per tick, despawns first. Ids
/// handed out by [`SimWorld::reserve_id`] act as liveness tokens for fetches
/// in flight: despawning a reserved id revokes it, and a later
/// [`SimWorld::spawn`] of that object is dropped without ever being loaded.
pub struct SimWorld {
    physics: Box<dyn PhysicsWorld>,
    scene: RenderScene,
    registry: SceneRegistry,
    ui: UiLayer,
    allocator: ObjectIdAllocator,
    props: Vec<SceneObject>,
    reserved: BTreeSet<ObjectId>,
    pending_spawns: VecDeque<SceneObject>,
    pending_despawns: Vec<ObjectId>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(Box::new(HeadlessPhysics::new()))
    }
}

impl SimWorld {
    pub fn new(physics: Box<dyn PhysicsWorld>) -> Self {
        Self {
            physics,
            scene: RenderScene::default(),
            registry: SceneRegistry::default(),
            ui: UiLayer::default(),
            allocator: ObjectIdAllocator::default(),
            props: Vec::new(),
            reserved: BTreeSet::new(),
            pending_spawns: VecDeque::new(),
            pending_despawns: Vec::new(),
        }
    }

    pub fn allocate_id(&mut self) -> ObjectId {
        self.allocator.allocate()
    }

    /// Allocates an id for an object whose fetch is about to start.
    pub fn reserve_id(&mut self) -> ObjectId {
        let id = self.allocator.allocate();
        self.reserved.insert(id);
        id
    }

    /// Queues a fetched object for loading. Returns `Ok(false)`, dropping the
    /// object, when its reservation was revoked while the fetch ran. An object
    /// that is unfetched or already loaded is rejected and its reservation
    /// stays open.
    pub fn spawn(&mut self, object: SceneObject) -> Result<bool, LifecycleError> {
        let id = object.id();
        if !self.reserved.contains(&id) {
            debug!(object = id.0, kind = object.type_tag(), "stale_fetch_discarded");
            return Ok(false);
        }
        match object.state() {
            LifecycleState::Constructed => return Err(LifecycleError::NotFetched { id }),
            LifecycleState::Loaded => return Err(LifecycleError::AlreadyLoaded { id }),
            LifecycleState::Fetched => {}
        }
        self.reserved.remove(&id);
        self.pending_spawns.push_back(object);
        Ok(true)
    }

    pub fn despawn(&mut self, id: ObjectId) -> bool {
        if self.reserved.remove(&id) {
            debug!(object = id.0, "spawn_revoked");
            return true;
        }
        let exists_now = self.props.iter().any(|object| object.id() == id);
        let pending_spawn = self.pending_spawns.iter().any(|object| object.id() == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    /// Applies queued despawns, then queued spawns. On error the failing
    /// object and everything behind it stay queued, so a later `despawn` can
    /// still reach them.
    pub fn apply_pending(&mut self) -> Result<(), LifecycleError> {
        if !self.pending_despawns.is_empty() {
            let mut pending = std::mem::take(&mut self.pending_despawns);
            pending.sort();
            pending.dedup();
            self.pending_spawns
                .retain(|object| pending.binary_search(&object.id()).is_err());

            let mut index = 0;
            while index < self.props.len() {
                if pending.binary_search(&self.props[index].id()).is_err() {
                    index += 1;
                    continue;
                }
                let mut object = self.props.remove(index);
                if let Err(error) = object.destruct(self.object_context()) {
                    self.props.insert(index, object);
                    self.pending_despawns = pending;
                    return Err(error);
                }
            }
        }

        while let Some(mut object) = self.pending_spawns.pop_front() {
            if let Err(error) = object.load(self.object_context()) {
                self.pending_spawns.push_front(object);
                return Err(error);
            }
            self.props.push(object);
        }
        Ok(())
    }

    /// Destructs every prop and forgets all queued work and reservations.
    pub fn clear(&mut self) -> Result<(), LifecycleError> {
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.reserved.clear();
        while let Some(mut object) = self.props.pop() {
            if let Err(error) = object.destruct(self.object_context()) {
                self.props.push(object);
                return Err(error);
            }
        }
        Ok(())
    }

    pub fn object_context(&mut self) -> ObjectContext<'_> {
        ObjectContext {
            physics: self.physics.as_mut(),
            scene: &mut self.scene,
            registry: &mut self.registry,
        }
    }

    pub fn step(&mut self, dt_seconds: f32) {
        self.physics.step(dt_seconds);
    }

    pub fn sync_transforms(&mut self) -> usize {
        render::sync_transforms(&self.registry, self.physics.as_ref(), &mut self.scene)
    }

    pub fn physics(&self) -> &dyn PhysicsWorld {
        self.physics.as_ref()
    }

    pub fn scene(&self) -> &RenderScene {
        &self.scene
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn ui(&self) -> &UiLayer {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiLayer {
        &mut self.ui
    }

    pub fn props(&self) -> &[SceneObject] {
        &self.props
    }

    pub fn find_prop(&self, id: ObjectId) -> Option<&SceneObject> {
        self.props.iter().find(|object| object.id() == id)
    }

    pub fn prop_count(&self) -> usize {
        self.props.len()
    }

    pub fn pending_spawn_count(&self) -> usize {
        self.pending_spawns.len()
    }

    pub fn is_reserved(&self, id: ObjectId) -> bool {
        self.reserved.contains(&id)
    }
}
