//! Per-frame cull traversal
//!
//! [`CullPass`] walks the tree top-down with [`SceneObject::frustum_cull_with`]
//! and collects the nodes to draw. Each child starts from its own copy of the
//! parent's output plane mask.

use std::sync::Arc;
use vrscene_math::Vec3;
use crate::frustum::{FrustumClassifier, MaskedClassifier, PlaneMask};
use crate::{CullResult, Frustum, SceneObject};

/// Counters for one traversal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Nodes passed to `frustum_cull`
    pub tested: usize,
    /// Subtrees rejected with `CullAll`
    pub culled_subtrees: usize,
    /// Nodes added to the render list
    pub emitted: usize,
}

/// Render list plus stats
#[derive(Debug, Default)]
pub struct CullOutput {
    pub visible: Vec<Arc<SceneObject>>,
    pub stats: CullStats,
}

impl CullOutput {
    pub fn names(&self) -> Vec<&str> {
        self.visible.iter().map(|n| n.name()).collect()
    }
}

/// Frustum-culling traversal over a scene tree
#[derive(Clone, Copy, Debug, Default)]
pub struct CullPass<C: FrustumClassifier = MaskedClassifier> {
    classifier: C,
}

impl CullPass<MaskedClassifier> {
    pub fn new() -> Self {
        Self { classifier: MaskedClassifier }
    }
}

impl<C: FrustumClassifier> CullPass<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Cull the tree under `root`
    pub fn run(&self, root: &Arc<SceneObject>, camera_position: Vec3, frustum: &Frustum) -> CullOutput {
        let mut out = CullOutput::default();
        self.visit(root, camera_position, frustum, PlaneMask::empty(), &mut out);
        log::debug!(
            "cull pass: tested {}, culled {} subtrees, emitted {}",
            out.stats.tested,
            out.stats.culled_subtrees,
            out.stats.emitted
        );
        out
    }

    fn visit(
        &self,
        node: &Arc<SceneObject>,
        camera_position: Vec3,
        frustum: &Frustum,
        parent_mask: PlaneMask,
        out: &mut CullOutput,
    ) {
        let mut mask = parent_mask;
        out.stats.tested += 1;

        let result = node.frustum_cull_with(&self.classifier, camera_position, frustum, &mut mask);
        match result {
            CullResult::CullAll => out.stats.culled_subtrees += 1,
            CullResult::RenderAll => Self::emit_subtree(node, out),
            CullResult::CullSelfTestChildren | CullResult::RenderSelfTestChildren => {
                if result.renders_self() {
                    Self::emit(node, out);
                }
                for child in node.children() {
                    self.visit(&child, camera_position, frustum, mask, out);
                }
            }
        }
    }

    fn emit(node: &Arc<SceneObject>, out: &mut CullOutput) {
        if node.is_renderable() {
            out.visible.push(node.clone());
            out.stats.emitted += 1;
        }
    }

    /// Everything below was proven inside; disabled or invisible nodes still
    /// drop their subtree
    fn emit_subtree(node: &Arc<SceneObject>, out: &mut CullOutput) {
        if !node.enabled() || !node.visible() {
            return;
        }
        Self::emit(node, out);
        for child in node.children() {
            Self::emit_subtree(&child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frustum::BasicClassifier;
    use crate::render_data::{MaterialId, RenderData, StaticMesh};
    use crate::Transform;

    fn cube_node(name: &str, at: Vec3) -> Arc<SceneObject> {
        let rd = RenderData::new()
            .with_mesh(Arc::new(StaticMesh::cube(1.0)))
            .with_material(MaterialId(1));
        SceneObject::with_render_data(name, rd, Transform::from_position(at))
    }

    fn box_frustum() -> Frustum {
        Frustum::from_planes([
            [1.0, 0.0, 0.0, 10.0],
            [-1.0, 0.0, 0.0, 10.0],
            [0.0, 1.0, 0.0, 10.0],
            [0.0, -1.0, 0.0, 10.0],
            [0.0, 0.0, 1.0, 10.0],
            [0.0, 0.0, -1.0, 10.0],
        ])
    }

    #[test]
    fn test_straddling_group_splits() {
        let root = SceneObject::new("root");
        root.add_child(cube_node("near", Vec3::ZERO), None).unwrap();
        root.add_child(cube_node("far", Vec3::new(30.0, 0.0, 0.0)), None).unwrap();

        let out = CullPass::new().run(&root, Vec3::ZERO, &box_frustum());
        assert_eq!(out.names(), vec!["near"]);
        assert_eq!(out.stats, CullStats { tested: 3, culled_subtrees: 1, emitted: 1 });
    }

    #[test]
    fn test_render_all_skips_testing() {
        let root = SceneObject::new("root");
        let group = SceneObject::new("group");
        root.add_child(group.clone(), None).unwrap();
        group.add_child(cube_node("a", Vec3::new(1.0, 0.0, 0.0)), None).unwrap();
        group.add_child(cube_node("b", Vec3::new(-1.0, 0.0, 0.0)), None).unwrap();

        let out = CullPass::new().run(&root, Vec3::ZERO, &box_frustum());
        assert_eq!(out.stats.tested, 1);
        assert_eq!(out.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_render_all_drops_hidden_descendants() {
        let root = SceneObject::new("root");
        let shown = cube_node("shown", Vec3::ZERO);
        let hidden = cube_node("hidden", Vec3::ZERO);
        hidden.force_visible(false);
        root.add_child(shown, None).unwrap();
        root.add_child(hidden, None).unwrap();

        let out = CullPass::new().run(&root, Vec3::ZERO, &box_frustum());
        assert_eq!(out.names(), vec!["shown"]);
    }

    #[test]
    fn test_basic_classifier_renders_everything_not_rejected() {
        let root = SceneObject::new("root");
        root.add_child(cube_node("near", Vec3::ZERO), None).unwrap();
        root.add_child(cube_node("far", Vec3::new(30.0, 0.0, 0.0)), None).unwrap();

        // the basic test never reports a straddle, so the root renders all
        let out = CullPass::with_classifier(BasicClassifier).run(&root, Vec3::ZERO, &box_frustum());
        assert_eq!(out.names(), vec!["near", "far"]);
    }
}
