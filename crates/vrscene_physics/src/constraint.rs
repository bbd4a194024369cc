//! Constraint handles
//!
//! A constraint lives on the scene object carrying body A and weakly
//! references the object carrying body B. Several constraints may share one
//! object; they chain like any non-exclusive component.

use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use slotmap::new_key_type;
use vrscene_core::{Component, ComponentCore, ComponentType, Scene, SceneObject};
use vrscene_math::Vec3;
use crate::world::{ConstraintRecord, SharedPhysicsWorld};

new_key_type! {
    /// Key to a constraint in the physics world
    pub struct ConstraintKey;
}

/// Constraint variants with their engine type ids
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Bodies keep their relative pose
    Fixed,
    /// Ball joint between one pivot on each body
    PointToPoint { pivot_a: Vec3, pivot_b: Vec3 },
    /// Motion along and about a shared axis
    Slider {
        lower_linear: f32,
        upper_linear: f32,
        lower_angular: f32,
        upper_angular: f32,
    },
    Hinge {
        pivot_a: Vec3,
        pivot_b: Vec3,
        axis_a: Vec3,
        axis_b: Vec3,
        lower_limit: f32,
        upper_limit: f32,
    },
    ConeTwist {
        pivot: Vec3,
        swing_limit: f32,
        twist_limit: f32,
    },
    /// Six degrees of freedom with per-axis limits
    Generic6Dof {
        linear_lower: Vec3,
        linear_upper: Vec3,
        angular_lower: Vec3,
        angular_upper: Vec3,
    },
}

impl ConstraintKind {
    /// Engine type id (1 = fixed .. 6 = generic 6-DOF)
    pub const fn id(&self) -> u8 {
        match self {
            ConstraintKind::Fixed => 1,
            ConstraintKind::PointToPoint { .. } => 2,
            ConstraintKind::Slider { .. } => 3,
            ConstraintKind::Hinge { .. } => 4,
            ConstraintKind::ConeTwist { .. } => 5,
            ConstraintKind::Generic6Dof { .. } => 6,
        }
    }

    /// Convert point-to-point pivots from Z-up to Y-up
    pub fn swap_up_axis(&mut self) {
        if let ConstraintKind::PointToPoint { pivot_a, pivot_b } = self {
            std::mem::swap(&mut pivot_a.y, &mut pivot_a.z);
            std::mem::swap(&mut pivot_b.y, &mut pivot_b.z);
        }
    }
}

/// Constraint component
pub struct Constraint {
    core: ComponentCore,
    world: SharedPhysicsWorld,
    kind: ConstraintKind,
    body_b: Weak<SceneObject>,
    breaking_impulse: Mutex<f32>,
    key: Mutex<Option<ConstraintKey>>,
}

impl Constraint {
    /// Constraint between the owner's body and `body_b`'s body
    pub fn new(world: SharedPhysicsWorld, kind: ConstraintKind, body_b: &Arc<SceneObject>) -> Arc<Self> {
        Arc::new(Self {
            core: ComponentCore::new(ComponentType::Constraint),
            world,
            kind,
            body_b: Arc::downgrade(body_b),
            breaking_impulse: Mutex::new(f32::MAX),
            key: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn body_b(&self) -> Option<Arc<SceneObject>> {
        self.body_b.upgrade()
    }

    pub fn key(&self) -> Option<ConstraintKey> {
        *self.key.lock()
    }

    pub fn breaking_impulse(&self) -> f32 {
        *self.breaking_impulse.lock()
    }

    pub fn set_breaking_impulse(&self, impulse: f32) {
        *self.breaking_impulse.lock() = impulse;
        if let Some(key) = self.key() {
            if let Some(record) = self.world.lock().get_constraint_mut(key) {
                record.breaking_impulse = impulse;
            }
        }
    }
}

impl Component for Constraint {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_added_to_scene(&self, _scene: &Scene) {
        let Some(owner) = self.owner_object() else {
            log::warn!("constraint added to scene without an owner");
            return;
        };
        let mut key = self.key.lock();
        if key.is_none() {
            let record = ConstraintRecord {
                kind: self.kind,
                breaking_impulse: self.breaking_impulse(),
                object_a: Arc::downgrade(&owner),
                object_b: self.body_b.clone(),
            };
            *key = Some(self.world.lock().add_constraint(record));
            log::debug!("registered constraint type {} on '{}'", self.kind.id(), owner.name());
        }
    }

    fn on_removed_from_scene(&self, _scene: &Scene) {
        if let Some(key) = self.key.lock().take() {
            self.world.lock().remove_constraint(key);
        }
    }
}
