//! Frame culling system
//!
//! Builds the view frustum from the camera each frame and runs the cull
//! traversal over the scene.

use std::sync::Arc;
use vrscene_core::{BasicClassifier, CullOutput, CullPass, Frustum, SceneObject, Vec3};
use vrscene_math::mat4;
use crate::config::{CameraConfig, CullingConfig};

/// Result of one culled frame
#[derive(Debug)]
pub struct FrameReport {
    pub frame: u64,
    pub output: CullOutput,
    /// Visible nodes with pending transform or mesh changes
    pub uploads: usize,
}

/// Runs the per-frame cull over a scene root
pub struct CullingSystem {
    camera: CameraConfig,
    use_basic_classifier: bool,
    frame: u64,
}

impl CullingSystem {
    pub fn new(camera: CameraConfig, culling: &CullingConfig) -> Self {
        Self {
            camera,
            use_basic_classifier: culling.use_basic_classifier,
            frame: 0,
        }
    }

    /// View frustum for a camera at `eye` looking at the configured target
    pub fn frustum(&self, eye: Vec3) -> Frustum {
        let projection = mat4::perspective(
            self.camera.fov.to_radians(),
            self.camera.aspect,
            self.camera.near,
            self.camera.far,
        );
        let view = mat4::look_at(eye, self.camera.target(), Vec3::Y);
        Frustum::from_view_projection(mat4::mul(projection, view))
    }

    /// Cull one frame with the camera at `eye`
    ///
    /// Dirty flags of the visible nodes are consumed here, standing in for
    /// the renderer's matrix uploads.
    pub fn update(&mut self, root: &Arc<SceneObject>, eye: Vec3) -> FrameReport {
        self.frame += 1;
        let frustum = self.frustum(eye);
        let output = if self.use_basic_classifier {
            CullPass::with_classifier(BasicClassifier).run(root, eye, &frustum)
        } else {
            CullPass::new().run(root, eye, &frustum)
        };

        let uploads = output
            .visible
            .iter()
            .filter(|node| !node.take_dirty_flags().is_empty())
            .count();

        log::debug!(
            "frame {}: {} visible, {} culled subtrees, {} uploads",
            self.frame,
            output.visible.len(),
            output.stats.culled_subtrees,
            uploads
        );

        FrameReport {
            frame: self.frame,
            output,
            uploads,
        }
    }
}
