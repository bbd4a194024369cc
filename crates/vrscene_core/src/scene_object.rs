//! Scene object: a node of the scene tree
//!
//! Nodes are shared as `Arc<SceneObject>`. A node strongly owns its children
//! and weakly references its parent, so dropping the root releases the tree.
//! Every node caches a hierarchical bounding volume (HBV) covering its own
//! world-space mesh bounds plus all descendants' HBVs; it is recomputed
//! lazily after a dirty mark.
//!
//! Locks are per node. Traversals copy the child list under the lock and walk
//! the copy unlocked, and no lock is held while component hooks run.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use vrscene_math::{mat4, Mat4, Vec3};
use crate::component::{claim_owner_object, clear_owner_object, release_owner_object, ComponentChains};
use crate::frustum::{Containment, FrustumClassifier, MaskedClassifier, PlaneMask};
use crate::{BoundingVolume, Component, ComponentType, Frustum, RenderData, Scene, SceneError, Transform};

/// Default number of consecutive frames needed to flip visibility
pub const DEFAULT_VISIBILITY_CHECK_FRAMES: i32 = 12;

bitflags! {
    /// Renderer-facing change tracking
    ///
    /// Separate from the HBV dirty flag: these stay set until the renderer
    /// takes them with [`SceneObject::take_dirty_flags`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const NONE = 0;
        /// World transform changed
        const TRANSFORM = 1 << 0;
        /// Render data (mesh or passes) replaced
        const MESH = 1 << 1;
        const ALL = Self::TRANSFORM.bits() | Self::MESH.bits();
    }
}

/// Outcome of [`SceneObject::frustum_cull`], ordered by how much gets drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CullResult {
    /// Skip this node and its whole subtree
    CullAll = 0,
    /// Don't draw this node, test each child
    CullSelfTestChildren = 1,
    /// Draw this node, test each child
    RenderSelfTestChildren = 2,
    /// Draw this node and every descendant without further tests
    RenderAll = 3,
}

impl CullResult {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn renders_self(self) -> bool {
        matches!(self, CullResult::RenderSelfTestChildren | CullResult::RenderAll)
    }

    pub fn tests_children(self) -> bool {
        matches!(self, CullResult::CullSelfTestChildren | CullResult::RenderSelfTestChildren)
    }
}

#[derive(Default)]
struct CachedBounds {
    /// HBV in world space
    transformed: BoundingVolume,
    /// This node's own mesh bounds in world space
    mesh: BoundingVolume,
}

struct Visibility {
    visible: bool,
    count: i32,
    check_frames: i32,
}

/// A node in the scene tree
pub struct SceneObject {
    name: String,
    self_ref: Weak<SceneObject>,
    parent: RwLock<Weak<SceneObject>>,
    children: Mutex<Vec<Arc<SceneObject>>>,
    components: Mutex<ComponentChains>,
    transform: RwLock<Transform>,
    render_data: RwLock<Option<RenderData>>,
    bounds: Mutex<CachedBounds>,
    bounding_volume_dirty: AtomicBool,
    dirty: AtomicU8,
    recompute_count: AtomicU64,
    enabled: AtomicBool,
    visibility: Mutex<Visibility>,
}

impl SceneObject {
    /// Create a detached, enabled, visible node with an identity transform
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            name: name.into(),
            self_ref: self_ref.clone(),
            parent: RwLock::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            components: Mutex::new(ComponentChains::default()),
            transform: RwLock::new(Transform::identity()),
            render_data: RwLock::new(None),
            bounds: Mutex::new(CachedBounds::default()),
            bounding_volume_dirty: AtomicBool::new(true),
            dirty: AtomicU8::new(DirtyFlags::ALL.bits()),
            recompute_count: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            visibility: Mutex::new(Visibility {
                visible: true,
                count: 0,
                check_frames: DEFAULT_VISIBILITY_CHECK_FRAMES,
            }),
        })
    }

    /// Create a node with render data and a local transform
    pub fn with_render_data(name: impl Into<String>, render_data: RenderData, transform: Transform) -> Arc<Self> {
        let node = Self::new(name);
        *node.render_data.write() = Some(render_data);
        *node.transform.write() = transform;
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Tree structure ---

    pub fn parent(&self) -> Option<Arc<SceneObject>> {
        self.parent.read().upgrade()
    }

    /// Snapshot of the direct children
    pub fn children(&self) -> Vec<Arc<SceneObject>> {
        self.children.lock().clone()
    }

    pub fn children_count(&self) -> usize {
        self.children.lock().len()
    }

    pub fn child_by_index(&self, index: usize) -> Result<Arc<SceneObject>, SceneError> {
        let children = self.children.lock();
        children
            .get(index)
            .cloned()
            .ok_or(SceneError::OutOfRange { index, len: children.len() })
    }

    /// All nodes below this one, pre-order
    pub fn descendants(&self) -> Vec<Arc<SceneObject>> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }

    /// Depth-first search of this node and its subtree
    pub fn find_by_name(&self, name: &str) -> Option<Arc<SceneObject>> {
        if self.name == name {
            return self.self_ref.upgrade();
        }
        self.children().into_iter().find_map(|child| child.find_by_name(name))
    }

    /// True if `self` is `root` or has `root` among its ancestors
    pub fn is_reachable_from(&self, root: &SceneObject) -> bool {
        if std::ptr::eq(self, root) {
            return true;
        }
        let mut current = self.parent();
        while let Some(node) = current {
            if std::ptr::eq(&*node, root) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn is_in_scene<'s>(&self, scene: Option<&'s Scene>) -> Option<&'s Scene> {
        scene.filter(|s| self.is_reachable_from(s.root()))
    }

    /// Link `child` as the last child of this node
    ///
    /// Fails if `child` is this node or one of its ancestors, or already has
    /// a parent. Fires the scene hooks on the child's subtree when this node
    /// is reachable from `scene`'s root.
    pub fn add_child(&self, child: Arc<SceneObject>, scene: Option<&Scene>) -> Result<(), SceneError> {
        if self.is_reachable_from(&child) {
            log::error!("add_child: '{}' is an ancestor of '{}'", child.name, self.name);
            return Err(SceneError::CycleDetected {
                parent: self.name.clone(),
                child: child.name.clone(),
            });
        }
        {
            let mut parent = child.parent.write();
            if parent.upgrade().is_some() {
                return Err(SceneError::AlreadyHasParent(child.name.clone()));
            }
            *parent = self.self_ref.clone();
        }
        self.children.lock().push(child.clone());

        if let Some(scene) = self.is_in_scene(scene) {
            child.on_added_to_scene(scene);
        }
        self.invalidate_bounds_upward();
        child.on_transform_changed();
        Ok(())
    }

    /// Unlink a direct child
    ///
    /// Only the caller that takes `child` out of the child list fires the
    /// scene hooks; a concurrent second removal gets `NotAChild`.
    pub fn remove_child(&self, child: &Arc<SceneObject>, scene: Option<&Scene>) -> Result<(), SceneError> {
        let removed = {
            let mut children = self.children.lock();
            match children.iter().position(|c| Arc::ptr_eq(c, child)) {
                Some(index) => {
                    children.remove(index);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return Err(SceneError::NotAChild {
                parent: self.name.clone(),
                child: child.name.clone(),
            });
        }

        if let Some(scene) = self.is_in_scene(scene) {
            child.on_removed_from_scene(scene);
        }
        self.detach_parent_link(child);
        Ok(())
    }

    /// Unlink every child
    pub fn clear(&self, scene: Option<&Scene>) {
        let removed = std::mem::take(&mut *self.children.lock());
        if removed.is_empty() {
            return;
        }
        let scene = self.is_in_scene(scene);
        for child in &removed {
            if let Some(scene) = scene {
                child.on_removed_from_scene(scene);
            }
            self.detach_parent_link(child);
        }
    }

    fn detach_parent_link(&self, child: &Arc<SceneObject>) {
        *child.parent.write() = Weak::new();
        self.invalidate_bounds_upward();
        child.on_transform_changed();
    }

    // --- Transform ---

    pub fn transform(&self) -> Transform {
        *self.transform.read()
    }

    pub fn set_transform(&self, transform: Transform) {
        *self.transform.write() = transform;
        self.on_transform_changed();
    }

    /// Edit the local transform in place
    pub fn update_transform(&self, f: impl FnOnce(&mut Transform)) {
        f(&mut self.transform.write());
        self.on_transform_changed();
    }

    /// World matrix: parent world matrix times the local matrix
    pub fn model_matrix(&self) -> Mat4 {
        let local = self.transform.read().to_matrix();
        match self.parent() {
            Some(parent) => mat4::mul(parent.model_matrix(), local),
            None => local,
        }
    }

    /// World position changed for this node and its whole subtree
    pub fn on_transform_changed(&self) {
        self.mark_dirty(DirtyFlags::TRANSFORM);
        self.dirty_hierarchical_bounding_volume();
        for child in self.children() {
            child.on_transform_changed();
        }
    }

    /// Mark this node's HBV dirty and propagate to ancestors, stopping at the
    /// first one already dirty
    pub fn dirty_hierarchical_bounding_volume(&self) {
        if self.bounding_volume_dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(parent) = self.parent() {
            parent.dirty_hierarchical_bounding_volume();
        }
    }

    /// Unconditionally dirty this node and every ancestor
    fn invalidate_bounds_upward(&self) {
        self.bounding_volume_dirty.store(true, Ordering::Release);
        let mut current = self.parent();
        while let Some(node) = current {
            node.bounding_volume_dirty.store(true, Ordering::Release);
            current = node.parent();
        }
    }

    pub fn is_bounding_volume_dirty(&self) -> bool {
        self.bounding_volume_dirty.load(Ordering::Acquire)
    }

    // --- Renderer change tracking ---

    pub fn dirty_flags(&self) -> DirtyFlags {
        DirtyFlags::from_bits_truncate(self.dirty.load(Ordering::Acquire))
    }

    pub fn mark_dirty(&self, flags: DirtyFlags) {
        self.dirty.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Return the pending flags and clear them
    pub fn take_dirty_flags(&self) -> DirtyFlags {
        DirtyFlags::from_bits_truncate(self.dirty.swap(0, Ordering::AcqRel))
    }

    // --- Render data and bounds ---

    pub fn render_data(&self) -> Option<RenderData> {
        self.render_data.read().clone()
    }

    pub fn set_render_data(&self, render_data: Option<RenderData>) {
        *self.render_data.write() = render_data;
        self.mark_dirty(DirtyFlags::MESH);
        self.dirty_hierarchical_bounding_volume();
    }

    /// Has render data whose first pass carries a material
    pub fn is_renderable(&self) -> bool {
        self.render_data
            .read()
            .as_ref()
            .is_some_and(RenderData::has_material)
    }

    /// World-space hierarchical bounding volume, recomputed if dirty
    ///
    /// The dirty flag is cleared before recomputing, so a mutation racing with
    /// the recompute re-marks the node and is picked up next time.
    pub fn bounding_volume(&self) -> BoundingVolume {
        if !self.bounding_volume_dirty.swap(false, Ordering::AcqRel) {
            return self.bounds.lock().transformed;
        }
        self.recompute_count.fetch_add(1, Ordering::Relaxed);

        let local = self
            .render_data
            .read()
            .as_ref()
            .and_then(|rd| rd.mesh().map(|mesh| mesh.bounding_volume()));

        let mut mesh_volume = BoundingVolume::new();
        if let Some(local) = local.filter(|bv| !bv.is_empty()) {
            mesh_volume.transform(&local, &self.model_matrix());
        }

        let mut volume = mesh_volume;
        for child in self.children() {
            let child_volume = child.bounding_volume();
            if !child_volume.is_empty() {
                volume.expand(&child_volume);
            }
        }

        let mut cache = self.bounds.lock();
        cache.transformed = volume;
        cache.mesh = mesh_volume;
        volume
    }

    /// This node's own world-space mesh bounds from the last recompute
    pub fn mesh_bounding_volume(&self) -> BoundingVolume {
        self.bounds.lock().mesh
    }

    /// How many times the HBV has actually been recomputed
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count.load(Ordering::Relaxed)
    }

    // --- Culling ---

    /// Decide how much of this subtree to draw, using the masked classifier
    ///
    /// `plane_mask` holds planes the parent is known to be fully inside of;
    /// on return it holds this node's result, to be copied to each child.
    pub fn frustum_cull(&self, camera_position: Vec3, frustum: &Frustum, plane_mask: &mut PlaneMask) -> CullResult {
        self.frustum_cull_with(&MaskedClassifier, camera_position, frustum, plane_mask)
    }

    pub fn frustum_cull_with<C: FrustumClassifier>(
        &self,
        classifier: &C,
        camera_position: Vec3,
        frustum: &Frustum,
        plane_mask: &mut PlaneMask,
    ) -> CullResult {
        if !self.enabled() || !self.visible() {
            log::trace!("cull '{}': disabled or invisible", self.name);
            return CullResult::CullAll;
        }

        let hbv = self.bounding_volume();
        let mut containment = classifier.classify(frustum, &hbv, plane_mask);
        log::trace!(
            "cull '{}': {:?} at distance {:.2}, mask {:?}",
            self.name,
            containment,
            (hbv.center() - camera_position).length(),
            plane_mask
        );

        match containment {
            Containment::Outside => return CullResult::CullAll,
            Containment::Inside => return CullResult::RenderAll,
            Containment::Intersect => {}
        }

        if !self.is_renderable() {
            return CullResult::CullSelfTestChildren;
        }

        // HBV straddles; with children the node's own mesh may still be outside
        if self.children_count() > 0 {
            let mut own_mask = *plane_mask;
            let mesh = self.mesh_bounding_volume();
            containment = classifier.classify(frustum, &mesh, &mut own_mask);
        }

        if containment == Containment::Outside {
            CullResult::CullSelfTestChildren
        } else {
            CullResult::RenderSelfTestChildren
        }
    }

    // --- Enabled / visible ---

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn visible(&self) -> bool {
        self.visibility.lock().visible
    }

    /// Report one frame's visibility sample
    ///
    /// Visibility only flips after the samples have leaned one way for more
    /// than `check_frames` net frames.
    pub fn set_visible(&self, visible: bool) {
        let mut v = self.visibility.lock();
        v.count += if visible { 1 } else { -1 };
        if v.count > v.check_frames {
            v.visible = true;
            v.count = 0;
        } else if v.count < -v.check_frames {
            v.visible = false;
            v.count = 0;
        }
    }

    /// Set visibility immediately, bypassing hysteresis
    pub fn force_visible(&self, visible: bool) {
        let mut v = self.visibility.lock();
        v.visible = visible;
        v.count = 0;
    }

    pub fn set_visibility_check_frames(&self, frames: i32) {
        self.visibility.lock().check_frames = frames.max(0);
    }

    // --- Components ---

    /// Attach `component` to the end of its type's chain
    ///
    /// Returns `false` if the chain head is exclusive, the component is
    /// already in the chain, or it is owned by another node.
    pub fn attach_component(&self, component: Arc<dyn Component>, scene: Option<&Scene>) -> bool {
        let claimed = match claim_owner_object(&component, &self.self_ref) {
            Ok(claimed) => claimed,
            Err(owner) => {
                log::debug!("attach_component: component already owned by '{}'", owner.name);
                return false;
            }
        };
        if !self.components.lock().insert(component.clone()) {
            if claimed {
                clear_owner_object(&component);
            }
            log::debug!("attach_component: {:?} rejected on '{}'", component.component_type(), self.name);
            return false;
        }

        if let Some(owner) = self.self_ref.upgrade() {
            component.on_attach(&owner);
        }
        if let Some(scene) = self.is_in_scene(scene) {
            component.on_added_to_scene(scene);
        }
        true
    }

    /// Splice `component` out of its chain
    pub fn detach_component(&self, component: &Arc<dyn Component>, scene: Option<&Scene>) -> bool {
        if !self.components.lock().remove(component) {
            return false;
        }
        if let Some(scene) = self.is_in_scene(scene) {
            component.on_removed_from_scene(scene);
        }
        release_owner_object(component);
        true
    }

    /// Detach the whole chain of `component_type`
    pub fn detach_components(&self, component_type: ComponentType, scene: Option<&Scene>) -> bool {
        let chain = self.components.lock().take_chain(component_type);
        if chain.is_empty() {
            return false;
        }
        let scene = self.is_in_scene(scene);
        for component in &chain {
            if let Some(scene) = scene {
                component.on_removed_from_scene(scene);
            }
            release_owner_object(component);
        }
        true
    }

    /// Head of the chain for `component_type`
    pub fn get_component(&self, component_type: ComponentType) -> Option<Arc<dyn Component>> {
        self.components.lock().head(component_type)
    }

    /// The whole chain for `component_type`, head first
    pub fn components_of(&self, component_type: ComponentType) -> Vec<Arc<dyn Component>> {
        self.components.lock().chain(component_type)
    }

    /// Chain heads of this node
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components.lock().heads()
    }

    /// Chain heads over this node and its subtree, optionally of one type
    pub fn all_components(&self, type_filter: Option<ComponentType>) -> Vec<Arc<dyn Component>> {
        let mut out: Vec<_> = match type_filter {
            Some(t) => self.get_component(t).into_iter().collect(),
            None => self.components(),
        };
        for child in self.children() {
            out.extend(child.all_components(type_filter));
        }
        out
    }

    /// Fire `on_added_to_scene` on every component in this subtree
    pub fn on_added_to_scene(&self, scene: &Scene) {
        let components = self.components.lock().all();
        for component in components {
            component.on_added_to_scene(scene);
        }
        for child in self.children() {
            child.on_added_to_scene(scene);
        }
    }

    /// Fire `on_removed_from_scene` on every component in this subtree
    pub fn on_removed_from_scene(&self, scene: &Scene) {
        let components = self.components.lock().all();
        for component in components {
            component.on_removed_from_scene(scene);
        }
        for child in self.children() {
            child.on_removed_from_scene(scene);
        }
    }

    // --- Geometric queries ---

    fn world_mesh_box(&self) -> Option<[f32; 6]> {
        let mesh = self.render_data.read().as_ref().and_then(|rd| rd.mesh().cloned());
        mesh.map(|mesh| mesh.transformed_bounding_box(&self.model_matrix()))
    }

    /// Strict overlap of the two nodes' world-space mesh boxes
    pub fn is_colliding(&self, other: &SceneObject) -> bool {
        let Some(a) = self.world_mesh_box() else {
            log::warn!("is_colliding: '{}' has no mesh", self.name);
            return false;
        };
        let Some(b) = other.world_mesh_box() else {
            log::warn!("is_colliding: '{}' has no mesh", other.name);
            return false;
        };
        (0..3).all(|axis| a[axis + 3] > b[axis] && a[axis] < b[axis + 3])
    }

    /// Slab test of a ray against the HBV
    pub fn intersects_ray(&self, origin: Vec3, direction: Vec3) -> bool {
        let hbv = self.bounding_volume();
        if hbv.is_empty() {
            return false;
        }
        let min = hbv.min_corner();
        let max = hbv.max_corner();

        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        for axis in 0..3 {
            let inv = 1.0 / direction[axis];
            let (lo, hi) = if inv >= 0.0 { (min[axis], max[axis]) } else { (max[axis], min[axis]) };
            let t0 = (lo - origin[axis]) * inv;
            let t1 = (hi - origin[axis]) * inv;
            // NaN from a zero direction inside the slab leaves the bounds alone
            if t0 > t_near {
                t_near = t0;
            }
            if t1 < t_far {
                t_far = t1;
            }
            if t_near > t_far {
                return false;
            }
        }
        t_far >= 0.0
    }

    /// Inclusive overlap of the two HBVs
    pub fn intersects_bounding_volume(&self, other: &SceneObject) -> bool {
        self.bounding_volume().intersects(&other.bounding_volume())
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("name", &self.name)
            .field("children", &self.children_count())
            .field("enabled", &self.enabled())
            .field("visible", &self.visible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_data::{MaterialId, StaticMesh};
    use crate::{ComponentCore, ComponentGroup};
    use std::sync::atomic::AtomicUsize;

    const EPSILON: f32 = 0.0001;

    fn vec_approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    fn cube_node(name: &str, half: f32, at: Vec3) -> Arc<SceneObject> {
        let rd = RenderData::new()
            .with_mesh(Arc::new(StaticMesh::cube(half)))
            .with_material(MaterialId(1));
        SceneObject::with_render_data(name, rd, Transform::from_position(at))
    }

    /// Axis-aligned box frustum covering [-10, 10]^3
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

    struct Counter {
        core: ComponentCore,
        added: AtomicUsize,
        removed: AtomicUsize,
        attached: AtomicUsize,
        detached: AtomicUsize,
    }

    impl Counter {
        fn new(component_type: ComponentType) -> Arc<Self> {
            Arc::new(Self {
                core: ComponentCore::new(component_type),
                added: AtomicUsize::new(0),
                removed: AtomicUsize::new(0),
                attached: AtomicUsize::new(0),
                detached: AtomicUsize::new(0),
            })
        }

        fn exclusive(component_type: ComponentType) -> Arc<Self> {
            Arc::new(Self {
                core: ComponentCore::exclusive(component_type),
                added: AtomicUsize::new(0),
                removed: AtomicUsize::new(0),
                attached: AtomicUsize::new(0),
                detached: AtomicUsize::new(0),
            })
        }
    }

    impl Component for Counter {
        fn core(&self) -> &ComponentCore {
            &self.core
        }
        fn on_added_to_scene(&self, _scene: &Scene) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn on_removed_from_scene(&self, _scene: &Scene) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_attach(&self, _owner: &Arc<SceneObject>) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
        fn on_detach(&self, _owner: &Arc<SceneObject>) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_add_child_links_both_ways() {
        let parent = SceneObject::new("parent");
        let child = SceneObject::new("child");
        parent.add_child(child.clone(), None).unwrap();

        assert_eq!(parent.children_count(), 1);
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
        assert!(Arc::ptr_eq(&parent.child_by_index(0).unwrap(), &child));
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let a = SceneObject::new("a");
        let b = SceneObject::new("b");
        let c = SceneObject::new("c");
        a.add_child(b.clone(), None).unwrap();
        b.add_child(c.clone(), None).unwrap();

        assert!(matches!(c.add_child(a.clone(), None), Err(SceneError::CycleDetected { .. })));
        assert!(matches!(a.add_child(a.clone(), None), Err(SceneError::CycleDetected { .. })));
        assert_eq!(c.children_count(), 0);
    }

    #[test]
    fn test_add_child_rejects_second_parent() {
        let a = SceneObject::new("a");
        let b = SceneObject::new("b");
        let child = SceneObject::new("child");
        a.add_child(child.clone(), None).unwrap();
        assert_eq!(
            b.add_child(child, None),
            Err(SceneError::AlreadyHasParent("child".into()))
        );
    }

    #[test]
    fn test_child_by_index_out_of_range() {
        let a = SceneObject::new("a");
        a.add_child(SceneObject::new("b"), None).unwrap();
        assert_eq!(
            a.child_by_index(3).unwrap_err(),
            SceneError::OutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_remove_child() {
        let parent = SceneObject::new("parent");
        let child = SceneObject::new("child");
        let stranger = SceneObject::new("stranger");
        parent.add_child(child.clone(), None).unwrap();

        assert!(matches!(parent.remove_child(&stranger, None), Err(SceneError::NotAChild { .. })));
        parent.remove_child(&child, None).unwrap();
        assert_eq!(parent.children_count(), 0);
        assert!(child.parent().is_none());

        // re-parenting after removal is allowed
        stranger.add_child(child.clone(), None).unwrap();
    }

    #[test]
    fn test_clear_and_descendants() {
        let root = SceneObject::new("root");
        let a = SceneObject::new("a");
        let b = SceneObject::new("b");
        let a1 = SceneObject::new("a1");
        root.add_child(a.clone(), None).unwrap();
        root.add_child(b.clone(), None).unwrap();
        a.add_child(a1.clone(), None).unwrap();

        let names: Vec<_> = root.descendants().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["a", "a1", "b"]);
        assert!(Arc::ptr_eq(&root.find_by_name("a1").unwrap(), &a1));
        assert!(root.find_by_name("missing").is_none());

        root.clear(None);
        assert_eq!(root.children_count(), 0);
        assert!(a.parent().is_none());
        assert!(b.parent().is_none());
        assert_eq!(a.children_count(), 1);
    }

    #[test]
    fn test_model_matrix_composes_parent() {
        let parent = SceneObject::new("parent");
        parent.set_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)).with_scale(Vec3::splat(2.0)));
        let child = SceneObject::new("child");
        child.set_transform(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        parent.add_child(child.clone(), None).unwrap();

        let p = mat4::transform_point(child.model_matrix(), Vec3::ZERO);
        assert!(vec_approx_eq(p, Vec3::new(1.0, 2.0, 0.0)), "got {:?}", p);
    }

    #[test]
    fn test_hbv_covers_children() {
        let root = SceneObject::new("root");
        let left = cube_node("left", 1.0, Vec3::new(-2.0, 0.0, 0.0));
        let right = cube_node("right", 1.0, Vec3::new(2.0, 0.0, 0.0));
        root.add_child(left, None).unwrap();
        root.add_child(right, None).unwrap();

        let hbv = root.bounding_volume();
        assert!(vec_approx_eq(hbv.min_corner(), Vec3::new(-3.0, -1.0, -1.0)));
        assert!(vec_approx_eq(hbv.max_corner(), Vec3::new(3.0, 1.0, 1.0)));
        // root has no mesh of its own
        assert!(root.mesh_bounding_volume().is_empty());
    }

    #[test]
    fn test_hbv_is_cached_until_dirty() {
        let node = cube_node("cube", 1.0, Vec3::ZERO);
        node.bounding_volume();
        node.bounding_volume();
        assert_eq!(node.recompute_count(), 1);

        node.set_transform(Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));
        assert!(node.is_bounding_volume_dirty());
        let hbv = node.bounding_volume();
        assert_eq!(node.recompute_count(), 2);
        assert!(vec_approx_eq(hbv.center(), Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn test_transform_change_dirties_ancestors_not_siblings() {
        let root = SceneObject::new("root");
        let a = cube_node("a", 1.0, Vec3::ZERO);
        let b = cube_node("b", 1.0, Vec3::new(4.0, 0.0, 0.0));
        root.add_child(a.clone(), None).unwrap();
        root.add_child(b.clone(), None).unwrap();
        root.bounding_volume();
        assert!(!root.is_bounding_volume_dirty());

        a.update_transform(|t| t.translate(Vec3::new(0.0, 3.0, 0.0)));
        assert!(a.is_bounding_volume_dirty());
        assert!(root.is_bounding_volume_dirty());
        assert!(!b.is_bounding_volume_dirty());

        let hbv = root.bounding_volume();
        assert_eq!(b.recompute_count(), 1);
        assert!(vec_approx_eq(hbv.max_corner(), Vec3::new(5.0, 4.0, 1.0)));
    }

    #[test]
    fn test_parent_transform_dirties_children() {
        let root = SceneObject::new("root");
        let child = cube_node("child", 1.0, Vec3::ZERO);
        root.add_child(child.clone(), None).unwrap();
        root.bounding_volume();
        child.take_dirty_flags();

        root.set_transform(Transform::from_position(Vec3::new(0.0, 0.0, 7.0)));
        assert!(child.is_bounding_volume_dirty());
        assert!(child.dirty_flags().contains(DirtyFlags::TRANSFORM));
        assert!(vec_approx_eq(root.bounding_volume().center(), Vec3::new(0.0, 0.0, 7.0)));
    }

    #[test]
    fn test_structural_change_dirties_parent() {
        let root = SceneObject::new("root");
        root.bounding_volume();
        assert!(root.bounding_volume().is_empty());

        root.add_child(cube_node("late", 1.0, Vec3::ZERO), None).unwrap();
        assert!(!root.bounding_volume().is_empty());

        root.clear(None);
        assert!(root.bounding_volume().is_empty());
    }

    #[test]
    fn test_take_dirty_flags() {
        let node = SceneObject::new("n");
        assert_eq!(node.take_dirty_flags(), DirtyFlags::ALL);
        assert!(node.dirty_flags().is_empty());
        node.set_render_data(Some(RenderData::new()));
        assert_eq!(node.take_dirty_flags(), DirtyFlags::MESH);
    }

    #[test]
    fn test_cull_disabled_or_invisible() {
        let node = cube_node("n", 1.0, Vec3::ZERO);
        let frustum = box_frustum();

        node.set_enabled(false);
        let mut mask = PlaneMask::empty();
        assert_eq!(node.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::CullAll);

        node.set_enabled(true);
        node.force_visible(false);
        assert_eq!(node.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::CullAll);
    }

    #[test]
    fn test_cull_inside_and_outside() {
        let frustum = box_frustum();
        let inside = cube_node("inside", 1.0, Vec3::ZERO);
        let outside = cube_node("outside", 1.0, Vec3::new(50.0, 0.0, 0.0));

        let mut mask = PlaneMask::empty();
        assert_eq!(inside.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::RenderAll);
        assert_eq!(mask, PlaneMask::ALL);

        let mut mask = PlaneMask::empty();
        assert_eq!(outside.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::CullAll);
    }

    #[test]
    fn test_cull_straddling_leaf_renders() {
        let frustum = box_frustum();
        let leaf = cube_node("leaf", 2.0, Vec3::new(10.0, 0.0, 0.0));
        let mut mask = PlaneMask::empty();
        assert_eq!(leaf.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::RenderSelfTestChildren);
        assert!(!mask.contains(PlaneMask::RIGHT));
    }

    #[test]
    fn test_cull_straddling_without_material_tests_children() {
        let frustum = box_frustum();
        let group = SceneObject::new("group");
        group.add_child(cube_node("in", 1.0, Vec3::ZERO), None).unwrap();
        group.add_child(cube_node("out", 1.0, Vec3::new(40.0, 0.0, 0.0)), None).unwrap();

        let mut mask = PlaneMask::empty();
        assert_eq!(group.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::CullSelfTestChildren);
    }

    #[test]
    fn test_cull_own_mesh_outside_with_children() {
        let frustum = box_frustum();
        let parent = cube_node("parent", 1.0, Vec3::new(40.0, 0.0, 0.0));
        let child = cube_node("child", 1.0, Vec3::ZERO);
        child.set_transform(Transform::from_position(Vec3::new(-40.0, 0.0, 0.0)));
        parent.add_child(child, None).unwrap();

        let mut mask = PlaneMask::empty();
        assert_eq!(parent.frustum_cull(Vec3::ZERO, &frustum, &mut mask), CullResult::CullSelfTestChildren);
    }

    #[test]
    fn test_visibility_hysteresis() {
        let node = SceneObject::new("n");
        node.set_visibility_check_frames(2);
        assert!(node.visible());

        node.set_visible(false);
        node.set_visible(false);
        assert!(node.visible());
        node.set_visible(false);
        assert!(!node.visible());

        // counter reset on flip
        node.set_visible(true);
        node.set_visible(true);
        assert!(!node.visible());
        node.set_visible(true);
        assert!(node.visible());

        node.force_visible(false);
        assert!(!node.visible());
    }

    #[test]
    fn test_attach_detach_hooks() {
        let scene = Scene::new("s");
        let node = SceneObject::new("n");
        scene.root().add_child(node.clone(), Some(&scene)).unwrap();

        let counter = Counter::new(ComponentType::Behavior);
        let handle: Arc<dyn Component> = counter.clone();
        assert!(node.attach_component(handle.clone(), Some(&scene)));
        assert_eq!(counter.attached.load(Ordering::SeqCst), 1);
        assert_eq!(counter.added.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&handle.owner_object().unwrap(), &node));

        assert!(node.detach_component(&handle, Some(&scene)));
        assert_eq!(counter.removed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.detached.load(Ordering::SeqCst), 1);
        assert!(handle.owner_object().is_none());
        assert!(!node.detach_component(&handle, Some(&scene)));
    }

    #[test]
    fn test_attach_outside_scene_skips_scene_hooks() {
        let scene = Scene::new("s");
        let orphan = SceneObject::new("orphan");
        let counter = Counter::new(ComponentType::Behavior);
        assert!(orphan.attach_component(counter.clone(), Some(&scene)));
        assert_eq!(counter.added.load(Ordering::SeqCst), 0);

        // joining the scene later fires the hook for the whole subtree
        scene.root().add_child(orphan.clone(), Some(&scene)).unwrap();
        assert_eq!(counter.added.load(Ordering::SeqCst), 1);

        scene.root().remove_child(&orphan, Some(&scene)).unwrap();
        assert_eq!(counter.removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_component_owned_elsewhere_rejected() {
        let a = SceneObject::new("a");
        let b = SceneObject::new("b");
        let counter: Arc<dyn Component> = Counter::new(ComponentType::Light);
        assert!(a.attach_component(counter.clone(), None));
        assert!(!b.attach_component(counter.clone(), None));
        assert!(!a.attach_component(counter, None));
    }

    #[test]
    fn test_rejected_attach_leaves_component_unowned() {
        let node = SceneObject::new("n");
        assert!(node.attach_component(Counter::exclusive(ComponentType::Camera), None));

        let second = Counter::new(ComponentType::Camera);
        let handle: Arc<dyn Component> = second.clone();
        assert!(!node.attach_component(handle.clone(), None));
        assert!(handle.owner_object().is_none());
        assert_eq!(second.attached.load(Ordering::SeqCst), 0);

        let other = SceneObject::new("other");
        assert!(other.attach_component(handle, None));
    }

    #[test]
    fn test_concurrent_attach_has_one_owner() {
        use std::sync::Barrier;

        for _ in 0..50 {
            let a = SceneObject::new("a");
            let b = SceneObject::new("b");
            let counter = Counter::new(ComponentType::Behavior);
            let handle: Arc<dyn Component> = counter.clone();
            let barrier = Barrier::new(2);

            let (won_a, won_b) = std::thread::scope(|s| {
                let ta = s.spawn(|| {
                    barrier.wait();
                    a.attach_component(handle.clone(), None)
                });
                let tb = s.spawn(|| {
                    barrier.wait();
                    b.attach_component(handle.clone(), None)
                });
                (ta.join().unwrap(), tb.join().unwrap())
            });

            assert!(won_a ^ won_b);
            let in_a = a.components_of(ComponentType::Behavior).len();
            let in_b = b.components_of(ComponentType::Behavior).len();
            assert_eq!(in_a + in_b, 1);
            assert_eq!(counter.attached.load(Ordering::SeqCst), 1);
            let owner = handle.owner_object().unwrap();
            assert!(Arc::ptr_eq(&owner, if won_a { &a } else { &b }));
        }
    }

    #[test]
    fn test_concurrent_add_child_has_one_parent() {
        use std::sync::Barrier;

        for _ in 0..50 {
            let p1 = SceneObject::new("p1");
            let p2 = SceneObject::new("p2");
            let child = SceneObject::new("child");
            let barrier = Barrier::new(2);

            let (r1, r2) = std::thread::scope(|s| {
                let t1 = s.spawn(|| {
                    barrier.wait();
                    p1.add_child(child.clone(), None)
                });
                let t2 = s.spawn(|| {
                    barrier.wait();
                    p2.add_child(child.clone(), None)
                });
                (t1.join().unwrap(), t2.join().unwrap())
            });

            assert!(r1.is_ok() ^ r2.is_ok());
            assert_eq!(p1.children_count() + p2.children_count(), 1);
        }
    }

    #[test]
    fn test_concurrent_remove_child_fires_hooks_once() {
        use std::sync::Barrier;

        for _ in 0..50 {
            let scene = Scene::new("s");
            let node = SceneObject::new("n");
            let counter = Counter::new(ComponentType::Behavior);
            node.attach_component(counter.clone(), None);
            scene.root().add_child(node.clone(), Some(&scene)).unwrap();
            assert_eq!(counter.added.load(Ordering::SeqCst), 1);
            let barrier = Barrier::new(2);

            let (r1, r2) = std::thread::scope(|s| {
                let remove = || {
                    barrier.wait();
                    scene.root().remove_child(&node, Some(&scene))
                };
                let t1 = s.spawn(remove);
                let t2 = s.spawn(remove);
                (t1.join().unwrap(), t2.join().unwrap())
            });

            assert!(r1.is_ok() ^ r2.is_ok());
            assert_eq!(counter.removed.load(Ordering::SeqCst), 1);
            assert!(node.parent().is_none());
        }
    }

    #[test]
    fn test_detach_components_drops_chain() {
        let scene = Scene::new("s");
        let first = Counter::new(ComponentType::Collider);
        let second = Counter::new(ComponentType::Collider);
        scene.root().attach_component(first.clone(), Some(&scene));
        scene.root().attach_component(second.clone(), Some(&scene));
        assert_eq!(scene.root().components_of(ComponentType::Collider).len(), 2);

        assert!(scene.root().detach_components(ComponentType::Collider, Some(&scene)));
        assert!(scene.root().get_component(ComponentType::Collider).is_none());
        assert_eq!(first.removed.load(Ordering::SeqCst), 1);
        assert_eq!(second.detached.load(Ordering::SeqCst), 1);
        assert!(!scene.root().detach_components(ComponentType::Collider, Some(&scene)));
    }

    #[test]
    fn test_all_components_over_subtree() {
        let root = SceneObject::new("root");
        let child = SceneObject::new("child");
        root.add_child(child.clone(), None).unwrap();
        root.attach_component(Counter::new(ComponentType::Light), None);
        child.attach_component(Counter::new(ComponentType::Light), None);
        child.attach_component(Counter::new(ComponentType::Camera), None);
        child.attach_component(ComponentGroup::new(ComponentType::Group), None);

        assert_eq!(root.all_components(None).len(), 4);
        assert_eq!(root.all_components(Some(ComponentType::Light)).len(), 2);
        assert_eq!(root.all_components(Some(ComponentType::Camera)).len(), 1);
    }

    #[test]
    fn test_is_colliding() {
        let a = cube_node("a", 1.0, Vec3::ZERO);
        let b = cube_node("b", 1.0, Vec3::new(1.5, 0.0, 0.0));
        let c = cube_node("c", 1.0, Vec3::new(2.0, 0.0, 0.0));
        let bare = SceneObject::new("bare");

        assert!(a.is_colliding(&b));
        // touching faces do not collide
        assert!(!a.is_colliding(&c));
        assert!(!a.is_colliding(&bare));
    }

    #[test]
    fn test_intersects_ray() {
        let node = cube_node("target", 1.0, Vec3::new(5.0, 0.0, 0.0));
        assert!(node.intersects_ray(Vec3::ZERO, Vec3::X));
        assert!(!node.intersects_ray(Vec3::ZERO, -Vec3::X));
        assert!(!node.intersects_ray(Vec3::ZERO, Vec3::Y));
        assert!(node.intersects_ray(Vec3::new(0.0, 0.5, 0.0), Vec3::X));
        // origin inside the box
        assert!(node.intersects_ray(Vec3::new(5.0, 0.0, 0.0), Vec3::Z));
        assert!(!SceneObject::new("empty").intersects_ray(Vec3::ZERO, Vec3::X));
    }

    #[test]
    fn test_intersects_bounding_volume() {
        let a = cube_node("a", 1.0, Vec3::ZERO);
        let b = cube_node("b", 1.0, Vec3::new(2.0, 0.0, 0.0));
        let c = cube_node("c", 1.0, Vec3::new(3.0, 0.0, 0.0));
        assert!(a.intersects_bounding_volume(&b));
        assert!(!a.intersects_bounding_volume(&c));
    }

    #[test]
    fn test_cull_result_codes() {
        assert_eq!(CullResult::CullAll.code(), 0);
        assert_eq!(CullResult::CullSelfTestChildren.code(), 1);
        assert_eq!(CullResult::RenderSelfTestChildren.code(), 2);
        assert_eq!(CullResult::RenderAll.code(), 3);
        assert!(CullResult::RenderAll.renders_self());
        assert!(!CullResult::RenderAll.tests_children());
        assert!(CullResult::CullSelfTestChildren.tests_children());
    }
}
