//! Render data contract
//!
//! Meshes and materials belong to the renderer; the scene graph only needs a
//! mesh's local bounding volume and whether the first pass has a material.

use std::fmt;
use std::sync::Arc;
use vrscene_math::{Mat4, Vec3};
use crate::BoundingVolume;
use crate::frustum::Boxable;

/// Geometry provided by the renderer
pub trait Mesh: Send + Sync {
    /// Bounding volume in mesh-local space
    fn bounding_volume(&self) -> BoundingVolume;

    /// World-space box `[min.x, min.y, min.z, max.x, max.y, max.z]` under `matrix`
    fn transformed_bounding_box(&self, matrix: &Mat4) -> [f32; 6] {
        self.bounding_volume().transformed(matrix).to_box_info()
    }
}

/// A mesh known only by its vertex positions
#[derive(Clone, Debug)]
pub struct StaticMesh {
    vertices: Vec<Vec3>,
    bounds: BoundingVolume,
}

impl StaticMesh {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        let bounds = BoundingVolume::from_points(vertices.iter().copied());
        Self { vertices, bounds }
    }

    /// Axis-aligned box mesh spanning `min..max`
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        Self::new(BoundingVolume::from_corners(min, max).corners().to_vec())
    }

    /// Cube of edge `2 * half_extent` centered at the origin
    pub fn cube(half_extent: f32) -> Self {
        Self::cuboid(Vec3::splat(-half_extent), Vec3::splat(half_extent))
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }
}

impl Mesh for StaticMesh {
    fn bounding_volume(&self) -> BoundingVolume {
        self.bounds
    }
}

/// Opaque material handle owned by the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// One render pass of a node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderPass {
    pub material: Option<MaterialId>,
}

/// Mesh plus render passes attached to a scene object
#[derive(Clone, Default)]
pub struct RenderData {
    mesh: Option<Arc<dyn Mesh>>,
    passes: Vec<RenderPass>,
}

impl RenderData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mesh
    pub fn with_mesh(mut self, mesh: Arc<dyn Mesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Append a pass using `material`
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.passes.push(RenderPass { material: Some(material) });
        self
    }

    pub fn mesh(&self) -> Option<&Arc<dyn Mesh>> {
        self.mesh.as_ref()
    }

    pub fn set_mesh(&mut self, mesh: Option<Arc<dyn Mesh>>) {
        self.mesh = mesh;
    }

    pub fn pass(&self, index: usize) -> Option<&RenderPass> {
        self.passes.get(index)
    }

    pub fn add_pass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// True when the first pass has a material to draw with
    pub fn has_material(&self) -> bool {
        self.pass(0).and_then(|p| p.material).is_some()
    }
}

impl fmt::Debug for RenderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderData")
            .field("mesh", &self.mesh.as_ref().map(|m| m.bounding_volume()))
            .field("passes", &self.passes)
            .finish()
    }
}
