//! SceneBuilder - Fluent scene construction
//!
//! Builds a scene tree of box meshes, optionally with a physics world.

use std::path::Path;
use std::sync::Arc;
use vrscene_core::{MaterialId, RenderData, Scene, SceneObject, StaticMesh, Transform, Vec3};
use vrscene_physics::{
    load_physics, BodyParams, LoadReport, LoaderError, PhysicsConfig, PhysicsWorld, RigidBody, RonPhysicsLoader,
    SharedPhysicsWorld,
};

/// A finished scene and its physics world, if any
pub struct BuiltScene {
    pub scene: Scene,
    pub physics: Option<SharedPhysicsWorld>,
}

/// Builder for scene trees
///
/// # Example
/// ```ignore
/// let built = SceneBuilder::new("demo")
///     .with_physics(PhysicsConfig::default())
///     .add_grid("blocks", 4, 4, 3.0, 0.5)
///     .add_cube("hero", Vec3::new(0.0, 1.0, 0.0), 1.0)
///     .add_rigid_body("hero", BodyParams::default())
///     .build();
/// ```
pub struct SceneBuilder {
    scene: Scene,
    physics: Option<SharedPhysicsWorld>,
    visibility_check_frames: Option<i32>,
    next_material: u32,
}

impl SceneBuilder {
    /// Create a builder with an empty root
    pub fn new(name: &str) -> Self {
        Self {
            scene: Scene::new(name),
            physics: None,
            visibility_check_frames: None,
            next_material: 0,
        }
    }

    /// Create a physics world that bodies register with
    pub fn with_physics(mut self, config: PhysicsConfig) -> Self {
        self.physics = Some(PhysicsWorld::with_config(config).shared());
        self
    }

    /// Visibility hysteresis applied to every node created afterwards
    pub fn with_visibility_check_frames(mut self, frames: i32) -> Self {
        self.visibility_check_frames = Some(frames);
        self
    }

    fn node(&self, name: &str, transform: Transform, render_data: Option<RenderData>) -> Arc<SceneObject> {
        let node = match render_data {
            Some(rd) => SceneObject::with_render_data(name, rd, transform),
            None => {
                let node = SceneObject::new(name);
                node.set_transform(transform);
                node
            }
        };
        if let Some(frames) = self.visibility_check_frames {
            node.set_visibility_check_frames(frames);
        }
        node
    }

    fn cube_render_data(&mut self, half_extent: f32) -> RenderData {
        self.next_material += 1;
        RenderData::new()
            .with_mesh(Arc::new(StaticMesh::cube(half_extent)))
            .with_material(MaterialId(self.next_material))
    }

    fn attach(&self, parent: &Arc<SceneObject>, child: Arc<SceneObject>) {
        if let Err(e) = parent.add_child(child, Some(&self.scene)) {
            log::error!("SceneBuilder: {}", e);
        }
    }

    /// Add a cube directly under the root
    pub fn add_cube(mut self, name: &str, position: Vec3, half_extent: f32) -> Self {
        let rd = self.cube_render_data(half_extent);
        let node = self.node(name, Transform::from_position(position), Some(rd));
        let root = self.scene.root().clone();
        self.attach(&root, node);
        self
    }

    /// Add a cube under the node named `parent`
    pub fn add_cube_to(mut self, parent: &str, name: &str, position: Vec3, half_extent: f32) -> Self {
        let Some(parent_node) = self.scene.find_by_name(parent) else {
            log::warn!("SceneBuilder: no parent named '{}' for '{}'", parent, name);
            return self;
        };
        let rd = self.cube_render_data(half_extent);
        let node = self.node(name, Transform::from_position(position), Some(rd));
        self.attach(&parent_node, node);
        self
    }

    /// Add an empty group node under the root
    pub fn add_group(self, name: &str, position: Vec3) -> Self {
        let node = self.node(name, Transform::from_position(position), None);
        let root = self.scene.root().clone();
        self.attach(&root, node);
        self
    }

    /// Add a group of `rows x cols` cubes on the XZ plane, centered on the origin
    ///
    /// Cubes are named `{name}_{row}_{col}`.
    pub fn add_grid(mut self, name: &str, rows: usize, cols: usize, spacing: f32, half_extent: f32) -> Self {
        self = self.add_group(name, Vec3::ZERO);
        let x0 = -(cols.saturating_sub(1) as f32) * spacing / 2.0;
        let z0 = -(rows.saturating_sub(1) as f32) * spacing / 2.0;
        for row in 0..rows {
            for col in 0..cols {
                let position = Vec3::new(x0 + col as f32 * spacing, 0.0, z0 + row as f32 * spacing);
                self = self.add_cube_to(name, &format!("{name}_{row}_{col}"), position, half_extent);
            }
        }
        self
    }

    /// Attach a rigid body to the node named `name`
    pub fn add_rigid_body(self, name: &str, params: BodyParams) -> Self {
        let Some(world) = self.physics.clone() else {
            log::warn!("SceneBuilder: rigid body for '{}' needs with_physics", name);
            return self;
        };
        match self.scene.find_by_name(name) {
            Some(node) => {
                if !node.attach_component(RigidBody::new(world, params), Some(&self.scene)) {
                    log::warn!("SceneBuilder: '{}' already has a rigid body", name);
                }
            }
            None => log::warn!("SceneBuilder: no node named '{}'", name),
        }
        self
    }

    /// Load a physics file onto the nodes built so far
    pub fn load_physics_file<P: AsRef<Path>>(
        self,
        path: P,
        ignore_up_axis: bool,
    ) -> Result<(Self, LoadReport), LoaderError> {
        let mut loader = RonPhysicsLoader::from_path(path, ignore_up_axis)?;
        let world = match &self.physics {
            Some(world) => world.clone(),
            None => {
                log::warn!("SceneBuilder: physics file loaded without with_physics, using defaults");
                PhysicsWorld::new().shared()
            }
        };
        let report = load_physics(&mut loader, &world, self.scene.root(), Some(&self.scene));
        let builder = Self { physics: Some(world), ..self };
        Ok((builder, report))
    }

    /// Finish building
    pub fn build(self) -> BuiltScene {
        BuiltScene {
            scene: self.scene,
            physics: self.physics,
        }
    }
}
