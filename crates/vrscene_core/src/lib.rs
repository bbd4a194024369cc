//! Scene graph core for the vrscene engine
//!
//! This crate provides the scene tree and the culling machinery on top of it:
//!
//! - [`BoundingVolume`] - Axis-aligned box with center and radius
//! - [`Frustum`] - Six view planes with masked box classification
//! - [`Transform`] - Local position, rotation and scale
//! - [`RenderData`] - Mesh plus render passes, as seen by the scene graph
//! - [`Component`] - Behavior units attached to nodes, chained per type
//! - [`SceneObject`] - Tree node with a cached hierarchical bounding volume
//! - [`Scene`] - Named root used for scene lifecycle hooks
//! - [`CullPass`] - Per-frame traversal producing a render list

mod bounding_volume;
mod frustum;
mod transform;
mod render_data;
mod component;
mod scene_object;
mod scene;
mod cull;
mod error;

pub use bounding_volume::BoundingVolume;
pub use frustum::{
    BasicClassifier, Boxable, Containment, Frustum, FrustumClassifier, MaskedClassifier, Plane, PlaneMask,
};
pub use transform::Transform;
pub use render_data::{MaterialId, Mesh, RenderData, RenderPass, StaticMesh};
pub use component::{same_component, Component, ComponentCore, ComponentGroup, ComponentType};
pub use scene_object::{CullResult, DirtyFlags, SceneObject, DEFAULT_VISIBILITY_CHECK_FRAMES};
pub use scene::Scene;
pub use cull::{CullOutput, CullPass, CullStats};
pub use error::SceneError;

// Re-export math types used throughout the public API
pub use vrscene_math::{Mat4, Quat, Vec3};
