//! Physics handles for vrscene
//!
//! Rigid bodies and constraints are opaque to the scene graph: they are
//! components that register descriptions with a [`PhysicsWorld`] while their
//! owner is in a scene. This crate provides:
//! - [`RigidBody`] and [`Constraint`] components
//! - A [`PhysicsWorld`] registry keyed by generational keys
//! - Physics file loading ([`RonPhysicsLoader`], [`load_physics`])

pub mod body;
pub mod constraint;
pub mod loader;
pub mod world;

// Re-export commonly used types
pub use body::{BodyKey, BodyParams, RigidBody};
pub use constraint::{Constraint, ConstraintKey, ConstraintKind};
pub use loader::{
    load_physics, BodyEntry, ConstraintEntry, LoadReport, LoadedBody, LoadedConstraint, LoaderError, PhysicsFile,
    PhysicsLoader, RonPhysicsLoader,
};
pub use world::{BodyRecord, ConstraintRecord, PhysicsConfig, PhysicsWorld, SharedPhysicsWorld};
