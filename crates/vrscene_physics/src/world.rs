//! Physics world registry
//!
//! Bodies and constraints registered by scene components. The world holds
//! descriptions and scene links only; simulation happens elsewhere.

use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use slotmap::SlotMap;
use vrscene_core::SceneObject;
use vrscene_math::Vec3;
use crate::body::{BodyKey, BodyParams};
use crate::constraint::{ConstraintKey, ConstraintKind};

/// Configuration for the physics world
#[derive(Clone, Debug)]
pub struct PhysicsConfig {
    /// Gravity acceleration
    pub gravity: Vec3,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

impl PhysicsConfig {
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }
}

/// A registered rigid body
#[derive(Clone, Debug)]
pub struct BodyRecord {
    /// Name of the owning scene object
    pub name: String,
    pub params: BodyParams,
    pub object: Weak<SceneObject>,
}

/// A registered constraint between the bodies of two scene objects
#[derive(Clone, Debug)]
pub struct ConstraintRecord {
    pub kind: ConstraintKind,
    pub breaking_impulse: f32,
    pub object_a: Weak<SceneObject>,
    pub object_b: Weak<SceneObject>,
}

/// Physics world shared between components
pub type SharedPhysicsWorld = Arc<Mutex<PhysicsWorld>>;

/// Registry of bodies and constraints
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    bodies: SlotMap<BodyKey, BodyRecord>,
    constraints: SlotMap<ConstraintKey, ConstraintRecord>,
    /// Physics configuration
    pub config: PhysicsConfig,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            config,
        }
    }

    /// Wrap in the shared handle components expect
    pub fn shared(self) -> SharedPhysicsWorld {
        Arc::new(Mutex::new(self))
    }

    pub fn add_body(&mut self, record: BodyRecord) -> BodyKey {
        self.bodies.insert(record)
    }

    /// Remove a body
    ///
    /// Constraints touching the body stay registered; they are owned by their
    /// components and go inactive until the body is registered again.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<BodyRecord> {
        let record = self.bodies.remove(key)?;
        let inactive = self
            .constraints
            .values()
            .filter(|c| Weak::ptr_eq(&c.object_a, &record.object) || Weak::ptr_eq(&c.object_b, &record.object))
            .count();
        if inactive > 0 {
            log::debug!("{} constraint(s) inactive without body '{}'", inactive, record.name);
        }
        Some(record)
    }

    pub fn get_body(&self, key: BodyKey) -> Option<&BodyRecord> {
        self.bodies.get(key)
    }

    pub fn get_body_mut(&mut self, key: BodyKey) -> Option<&mut BodyRecord> {
        self.bodies.get_mut(key)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &BodyRecord)> {
        self.bodies.iter()
    }

    /// Key of the body registered for `object`
    pub fn body_for_object(&self, object: &SceneObject) -> Option<BodyKey> {
        self.bodies
            .iter()
            .find(|(_, b)| std::ptr::eq(b.object.as_ptr(), object))
            .map(|(key, _)| key)
    }

    pub fn add_constraint(&mut self, record: ConstraintRecord) -> ConstraintKey {
        self.constraints.insert(record)
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Option<ConstraintRecord> {
        self.constraints.remove(key)
    }

    pub fn get_constraint(&self, key: ConstraintKey) -> Option<&ConstraintRecord> {
        self.constraints.get(key)
    }

    pub fn get_constraint_mut(&mut self, key: ConstraintKey) -> Option<&mut ConstraintRecord> {
        self.constraints.get_mut(key)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Constraints whose bodies are both registered
    pub fn active_constraint_count(&self) -> usize {
        self.constraints.keys().filter(|&key| self.constraint_bodies(key).is_some()).count()
    }

    /// Body keys on both ends, if both objects currently have bodies
    pub fn constraint_bodies(&self, key: ConstraintKey) -> Option<(BodyKey, BodyKey)> {
        let record = self.constraints.get(key)?;
        let a = record.object_a.upgrade()?;
        let b = record.object_b.upgrade()?;
        Some((self.body_for_object(&a)?, self.body_for_object(&b)?))
    }
}
