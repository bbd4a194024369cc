//! Rigid body handles

use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use slotmap::new_key_type;
use vrscene_core::{Component, ComponentCore, ComponentType, Scene, SceneObject};
use crate::world::{BodyRecord, SharedPhysicsWorld};

new_key_type! {
    /// Key to a rigid body in the physics world
    ///
    /// Generational: a key to a removed body stays invalid even after its
    /// slot is reused.
    pub struct BodyKey;
}

/// Body parameters handed to the physics engine
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParams {
    /// Mass in kilograms, zero for static bodies
    pub mass: f32,
    pub friction: f32,
    /// Coefficient of restitution (0.0 = no bounce, 1.0 = perfect bounce)
    pub restitution: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl BodyParams {
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

/// Rigid body component
///
/// Exclusive: a scene object carries at most one. The body is registered
/// with the world while its owner is part of a scene.
pub struct RigidBody {
    core: ComponentCore,
    world: SharedPhysicsWorld,
    params: Mutex<BodyParams>,
    key: Mutex<Option<BodyKey>>,
}

impl RigidBody {
    pub fn new(world: SharedPhysicsWorld, params: BodyParams) -> Arc<Self> {
        Arc::new(Self {
            core: ComponentCore::exclusive(ComponentType::RigidBody),
            world,
            params: Mutex::new(params),
            key: Mutex::new(None),
        })
    }

    /// World key while registered
    pub fn key(&self) -> Option<BodyKey> {
        *self.key.lock()
    }

    pub fn params(&self) -> BodyParams {
        *self.params.lock()
    }

    /// Replace the parameters, updating the world record if registered
    pub fn set_params(&self, params: BodyParams) {
        *self.params.lock() = params;
        if let Some(key) = self.key() {
            if let Some(record) = self.world.lock().get_body_mut(key) {
                record.params = params;
            }
        }
    }

    fn register(&self, owner: &Arc<SceneObject>) {
        let mut key = self.key.lock();
        if key.is_some() {
            return;
        }
        let record = BodyRecord {
            name: owner.name().to_string(),
            params: self.params(),
            object: Arc::downgrade(owner),
        };
        *key = Some(self.world.lock().add_body(record));
        log::debug!("registered rigid body '{}'", owner.name());
    }
}

impl Component for RigidBody {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_added_to_scene(&self, _scene: &Scene) {
        match self.owner_object() {
            Some(owner) => self.register(&owner),
            None => log::warn!("rigid body added to scene without an owner"),
        }
    }

    fn on_removed_from_scene(&self, _scene: &Scene) {
        if let Some(key) = self.key.lock().take() {
            self.world.lock().remove_body(key);
        }
    }
}
