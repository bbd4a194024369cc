//! Scene context
//!
//! A [`Scene`] names a root node. Structural and component operations take
//! an `Option<&Scene>` so hooks fire only for nodes reachable from its root.

use std::sync::Arc;
use crate::{SceneError, SceneObject};

/// A named scene rooted at one [`SceneObject`]
#[derive(Debug)]
pub struct Scene {
    name: String,
    root: Arc<SceneObject>,
}

impl Scene {
    /// Create a scene with an empty root node named `"root"`
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_root(name, SceneObject::new("root"))
    }

    pub fn with_root(name: impl Into<String>, root: Arc<SceneObject>) -> Self {
        Self { name: name.into(), root }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Arc<SceneObject> {
        &self.root
    }

    /// True if `node` is reachable from the root
    pub fn contains(&self, node: &SceneObject) -> bool {
        node.is_reachable_from(&self.root)
    }

    /// Add `node` directly under the root
    pub fn add_object(&self, node: Arc<SceneObject>) -> Result<(), SceneError> {
        self.root.add_child(node, Some(self))
    }

    /// Unlink `node` from its parent, firing removal hooks
    pub fn remove_object(&self, node: &Arc<SceneObject>) -> Result<(), SceneError> {
        match node.parent() {
            Some(parent) => parent.remove_child(node, Some(self)),
            None => Err(SceneError::NotAChild {
                parent: self.root.name().to_string(),
                child: node.name().to_string(),
            }),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<SceneObject>> {
        self.root.find_by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene() {
        let scene = Scene::new("main");
        assert_eq!(scene.name(), "main");
        assert_eq!(scene.root().name(), "root");
        assert!(scene.contains(scene.root()));
    }

    #[test]
    fn test_add_and_remove_object() {
        let scene = Scene::new("main");
        let group = SceneObject::new("group");
        let leaf = SceneObject::new("leaf");
        group.add_child(leaf.clone(), None).unwrap();
        assert!(!scene.contains(&leaf));

        scene.add_object(group.clone()).unwrap();
        assert!(scene.contains(&leaf));
        assert!(Arc::ptr_eq(&scene.find_by_name("leaf").unwrap(), &leaf));

        scene.remove_object(&leaf).unwrap();
        assert!(!scene.contains(&leaf));
        assert!(scene.contains(&group));
    }

    #[test]
    fn test_remove_detached_object() {
        let scene = Scene::new("main");
        let loose = SceneObject::new("loose");
        assert!(matches!(scene.remove_object(&loose), Err(SceneError::NotAChild { .. })));
    }
}
