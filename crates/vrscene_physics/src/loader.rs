//! Physics file loading
//!
//! A physics file lists rigid bodies by scene-object name and constraints
//! between pairs of those bodies. [`load_physics`] matches bodies to nodes
//! of a scene tree and attaches the corresponding components.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use vrscene_core::{Scene, SceneObject};
use crate::body::{BodyParams, RigidBody};
use crate::constraint::{Constraint, ConstraintKind};
use crate::world::SharedPhysicsWorld;

/// Error loading a physics file
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
    /// A constraint names a body the file does not define
    #[error("constraint references unknown body '{0}'")]
    UnknownBody(String),
}

/// A rigid body entry in a physics file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyEntry {
    /// Name of the scene object that receives the body
    pub name: String,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for BodyEntry {
    fn default() -> Self {
        let params = BodyParams::default();
        Self {
            name: String::new(),
            mass: params.mass,
            friction: params.friction,
            restitution: params.restitution,
        }
    }
}

impl BodyEntry {
    pub fn params(&self) -> BodyParams {
        BodyParams {
            mass: self.mass,
            friction: self.friction,
            restitution: self.restitution,
        }
    }
}

/// A constraint entry; bodies are referenced by name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintEntry {
    pub body_a: String,
    pub body_b: String,
    pub kind: ConstraintKind,
    #[serde(default = "unbreakable")]
    pub breaking_impulse: f32,
}

fn unbreakable() -> f32 {
    f32::MAX
}

/// On-disk physics description
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsFile {
    #[serde(default)]
    pub bodies: Vec<BodyEntry>,
    #[serde(default)]
    pub constraints: Vec<ConstraintEntry>,
}

impl PhysicsFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, LoaderError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LoaderError> {
        let pretty = ron::ser::PrettyConfig::new().depth_limit(4);
        let contents = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Body yielded by a [`PhysicsLoader`]; `id` is unique within one loader
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedBody {
    pub id: usize,
    pub name: String,
    pub params: BodyParams,
}

/// Constraint yielded by a [`PhysicsLoader`], referencing body ids
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedConstraint {
    pub body_a: usize,
    pub body_b: usize,
    pub kind: ConstraintKind,
    pub breaking_impulse: f32,
}

/// Source of bodies and constraints, consumed once
pub trait PhysicsLoader {
    fn next_rigid_body(&mut self) -> Option<LoadedBody>;

    /// Name of the scene object `body` belongs to
    fn rigid_body_name<'a>(&self, body: &'a LoadedBody) -> &'a str {
        &body.name
    }

    fn next_constraint(&mut self) -> Option<LoadedConstraint>;
}

/// Loader over a RON [`PhysicsFile`]
#[derive(Debug)]
pub struct RonPhysicsLoader {
    bodies: std::vec::IntoIter<LoadedBody>,
    constraints: std::vec::IntoIter<LoadedConstraint>,
}

impl RonPhysicsLoader {
    /// Resolve body names and, unless `ignore_up_axis`, convert pivots from
    /// the file's Z-up convention to Y-up
    pub fn new(file: PhysicsFile, ignore_up_axis: bool) -> Result<Self, LoaderError> {
        let ids: HashMap<&str, usize> = file
            .bodies
            .iter()
            .enumerate()
            .map(|(id, b)| (b.name.as_str(), id))
            .collect();
        let lookup = |name: &str| ids.get(name).copied().ok_or_else(|| LoaderError::UnknownBody(name.to_string()));

        let constraints = file
            .constraints
            .iter()
            .map(|c| -> Result<LoadedConstraint, LoaderError> {
                let mut kind = c.kind;
                if !ignore_up_axis {
                    kind.swap_up_axis();
                }
                Ok(LoadedConstraint {
                    body_a: lookup(&c.body_a)?,
                    body_b: lookup(&c.body_b)?,
                    kind,
                    breaking_impulse: c.breaking_impulse,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bodies: Vec<_> = file
            .bodies
            .into_iter()
            .enumerate()
            .map(|(id, b)| LoadedBody { id, params: b.params(), name: b.name })
            .collect();

        Ok(Self {
            bodies: bodies.into_iter(),
            constraints: constraints.into_iter(),
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, ignore_up_axis: bool) -> Result<Self, LoaderError> {
        Self::new(PhysicsFile::load(path)?, ignore_up_axis)
    }

    pub fn from_str(contents: &str, ignore_up_axis: bool) -> Result<Self, LoaderError> {
        Self::new(PhysicsFile::parse(contents)?, ignore_up_axis)
    }
}

impl PhysicsLoader for RonPhysicsLoader {
    fn next_rigid_body(&mut self) -> Option<LoadedBody> {
        self.bodies.next()
    }

    fn next_constraint(&mut self) -> Option<LoadedConstraint> {
        self.constraints.next()
    }
}

/// What [`load_physics`] attached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub bodies: usize,
    pub constraints: usize,
    /// Bodies with no matching node plus constraints with an unresolved end
    pub skipped: usize,
}

/// Attach the loader's bodies and constraints to nodes under `root`
///
/// Bodies go to the node with the matching name. A constraint goes to body
/// A's node and is skipped unless both of its bodies were attached.
pub fn load_physics<L: PhysicsLoader + ?Sized>(
    loader: &mut L,
    world: &SharedPhysicsWorld,
    root: &Arc<SceneObject>,
    scene: Option<&Scene>,
) -> LoadReport {
    let mut report = LoadReport::default();
    let mut attached: HashMap<usize, Arc<SceneObject>> = HashMap::new();

    while let Some(body) = loader.next_rigid_body() {
        let name = loader.rigid_body_name(&body);
        let Some(node) = root.find_by_name(name) else {
            log::debug!("physics body '{}' has no scene object", name);
            report.skipped += 1;
            continue;
        };
        if node.attach_component(RigidBody::new(world.clone(), body.params), scene) {
            attached.insert(body.id, node);
            report.bodies += 1;
        } else {
            log::warn!("scene object '{}' already has a rigid body", name);
            report.skipped += 1;
        }
    }

    while let Some(entry) = loader.next_constraint() {
        let (Some(node_a), Some(node_b)) = (attached.get(&entry.body_a), attached.get(&entry.body_b)) else {
            report.skipped += 1;
            continue;
        };
        let constraint = Constraint::new(world.clone(), entry.kind, node_b);
        constraint.set_breaking_impulse(entry.breaking_impulse);
        if node_a.attach_component(constraint, scene) {
            report.constraints += 1;
        } else {
            report.skipped += 1;
        }
    }

    log::info!(
        "loaded physics: {} bodies, {} constraints, {} skipped",
        report.bodies,
        report.constraints,
        report.skipped
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrscene_math::Vec3;

    const FILE: &str = r#"(
        bodies: [
            (name: "door", mass: 5.0, friction: 0.8, restitution: 0.0),
            (name: "frame", mass: 0.0),
        ],
        constraints: [
            (
                body_a: "door",
                body_b: "frame",
                kind: PointToPoint(pivot_a: (x: 0.0, y: 1.0, z: 2.0), pivot_b: (x: 0.0, y: 0.0, z: 3.0)),
                breaking_impulse: 40.0,
            ),
        ],
    )"#;

    #[test]
    fn test_parse_file() {
        let file = PhysicsFile::parse(FILE).unwrap();
        assert_eq!(file.bodies.len(), 2);
        assert_eq!(file.bodies[0].mass, 5.0);
        // unspecified params fall back to defaults
        assert_eq!(file.bodies[1].params().friction, BodyParams::default().friction);
        assert_eq!(file.constraints[0].breaking_impulse, 40.0);
    }

    #[test]
    fn test_loader_swaps_up_axis() {
        let mut loader = RonPhysicsLoader::from_str(FILE, false).unwrap();
        let constraint = loader.next_constraint().unwrap();
        assert_eq!(
            constraint.kind,
            ConstraintKind::PointToPoint { pivot_a: Vec3::new(0.0, 2.0, 1.0), pivot_b: Vec3::new(0.0, 3.0, 0.0) }
        );
        assert_eq!((constraint.body_a, constraint.body_b), (0, 1));

        let mut loader = RonPhysicsLoader::from_str(FILE, true).unwrap();
        let constraint = loader.next_constraint().unwrap();
        assert_eq!(
            constraint.kind,
            ConstraintKind::PointToPoint { pivot_a: Vec3::new(0.0, 1.0, 2.0), pivot_b: Vec3::new(0.0, 0.0, 3.0) }
        );
    }

    #[test]
    fn test_unknown_body() {
        let text = r#"(bodies: [(name: "a")], constraints: [(body_a: "a", body_b: "ghost", kind: Fixed)])"#;
        let err = RonPhysicsLoader::from_str(text, true).unwrap_err();
        assert!(matches!(err, LoaderError::UnknownBody(ref name) if name == "ghost"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(PhysicsFile::parse("(bodies: ["), Err(LoaderError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PhysicsFile::load("/nonexistent/physics.ron");
        assert!(matches!(result, Err(LoaderError::Io(_))));
    }
}
