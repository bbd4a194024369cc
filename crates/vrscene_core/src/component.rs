//! Components attached to scene objects
//!
//! A component is a behavior unit owned by at most one [`SceneObject`] at a
//! time. Components of the same [`ComponentType`] on one node form an ordered
//! chain: [`SceneObject::get_component`] returns the head, and detaching the
//! head promotes the next one. A head marked exclusive refuses further
//! same-type attachments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::{Mutex, RwLock};
use crate::{Scene, SceneObject};

/// Type tag used to group components into chains
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Behavior,
    Camera,
    Light,
    Collider,
    RigidBody,
    Constraint,
    Group,
    /// Application-defined component kinds
    Custom(u32),
}

/// State every component carries
pub struct ComponentCore {
    component_type: ComponentType,
    exclusive: bool,
    enabled: AtomicBool,
    owner: RwLock<Weak<SceneObject>>,
    parent: RwLock<Option<Weak<dyn Component>>>,
}

impl ComponentCore {
    /// Core for a component that may share its type chain
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            exclusive: false,
            enabled: AtomicBool::new(true),
            owner: RwLock::new(Weak::new()),
            parent: RwLock::new(None),
        }
    }

    /// Core for a component that must be the only one of its type on a node
    pub fn exclusive(component_type: ComponentType) -> Self {
        Self {
            exclusive: true,
            ..Self::new(component_type)
        }
    }

    /// The node this component is directly attached to
    pub fn direct_owner(&self) -> Option<Arc<SceneObject>> {
        self.owner.read().upgrade()
    }

    pub fn set_parent(&self, parent: Option<Weak<dyn Component>>) {
        *self.parent.write() = parent;
    }

    fn parent(&self) -> Option<Arc<dyn Component>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }
}

/// A behavior unit attachable to a [`SceneObject`]
///
/// Implementors provide [`Component::core`]; every hook has an empty default.
pub trait Component: Send + Sync {
    fn core(&self) -> &ComponentCore;

    /// The owner became reachable from `scene`'s root
    fn on_added_to_scene(&self, _scene: &Scene) {}

    /// The owner is about to stop being reachable from `scene`'s root
    fn on_removed_from_scene(&self, _scene: &Scene) {}

    /// Attached to `owner`
    fn on_attach(&self, _owner: &Arc<SceneObject>) {}

    /// Detached from `owner`
    fn on_detach(&self, _owner: &Arc<SceneObject>) {}

    fn component_type(&self) -> ComponentType {
        self.core().component_type
    }

    fn is_exclusive(&self) -> bool {
        self.core().exclusive
    }

    fn enabled(&self) -> bool {
        self.core().enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.core().enabled.store(enabled, Ordering::Release);
    }

    /// Owning node, falling back to the parent component's owner
    fn owner_object(&self) -> Option<Arc<SceneObject>> {
        let core = self.core();
        core.direct_owner()
            .or_else(|| core.parent().and_then(|p| p.owner_object()))
    }

    /// Enclosing component (e.g. a [`ComponentGroup`]), if any
    fn parent_component(&self) -> Option<Arc<dyn Component>> {
        self.core().parent()
    }
}

/// Identity comparison for component handles
pub fn same_component(a: &Arc<dyn Component>, b: &Arc<dyn Component>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Claim `component` for `owner` unless another live node holds it
///
/// The check and the write happen under one lock, so two nodes racing for
/// the same component cannot both win. `Ok(true)` means newly claimed,
/// `Ok(false)` means `owner` already held it.
pub(crate) fn claim_owner_object(
    component: &Arc<dyn Component>,
    owner: &Weak<SceneObject>,
) -> Result<bool, Arc<SceneObject>> {
    let mut current = component.core().owner.write();
    match current.upgrade() {
        Some(existing) if std::ptr::eq(Arc::as_ptr(&existing), owner.as_ptr()) => Ok(false),
        Some(existing) => Err(existing),
        None => {
            *current = owner.clone();
            Ok(true)
        }
    }
}

/// Clear the owner without firing hooks
pub(crate) fn clear_owner_object(component: &Arc<dyn Component>) -> Option<Arc<SceneObject>> {
    std::mem::take(&mut *component.core().owner.write()).upgrade()
}

/// Clear the owner, firing `on_detach`
pub(crate) fn release_owner_object(component: &Arc<dyn Component>) {
    if let Some(previous) = clear_owner_object(component) {
        component.on_detach(&previous);
    }
}

/// Per-node storage: one ordered chain per component type
#[derive(Default)]
pub(crate) struct ComponentChains {
    chains: Vec<Vec<Arc<dyn Component>>>,
}

impl ComponentChains {
    fn position(&self, component_type: ComponentType) -> Option<usize> {
        self.chains
            .iter()
            .position(|chain| chain[0].component_type() == component_type)
    }

    pub fn head(&self, component_type: ComponentType) -> Option<Arc<dyn Component>> {
        self.position(component_type).map(|i| self.chains[i][0].clone())
    }

    pub fn chain(&self, component_type: ComponentType) -> Vec<Arc<dyn Component>> {
        self.position(component_type)
            .map(|i| self.chains[i].clone())
            .unwrap_or_default()
    }

    pub fn heads(&self) -> Vec<Arc<dyn Component>> {
        self.chains.iter().map(|chain| chain[0].clone()).collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn Component>> {
        self.chains.iter().flatten().cloned().collect()
    }

    /// Append to the type's chain; fails on an exclusive head or a duplicate
    pub fn insert(&mut self, component: Arc<dyn Component>) -> bool {
        match self.position(component.component_type()) {
            Some(i) => {
                let chain = &mut self.chains[i];
                if chain[0].is_exclusive() || chain.iter().any(|c| same_component(c, &component)) {
                    return false;
                }
                chain.push(component);
            }
            None => self.chains.push(vec![component]),
        }
        true
    }

    /// Splice `component` out of its chain; the successor of a removed head
    /// becomes the new head
    pub fn remove(&mut self, component: &Arc<dyn Component>) -> bool {
        let Some(i) = self.position(component.component_type()) else {
            return false;
        };
        let chain = &mut self.chains[i];
        let Some(at) = chain.iter().position(|c| same_component(c, component)) else {
            return false;
        };
        chain.remove(at);
        if chain.is_empty() {
            self.chains.remove(i);
        }
        true
    }

    /// Remove and return a whole chain, head first
    pub fn take_chain(&mut self, component_type: ComponentType) -> Vec<Arc<dyn Component>> {
        match self.position(component_type) {
            Some(i) => self.chains.remove(i),
            None => Vec::new(),
        }
    }
}

/// A component that owns child components
///
/// Children get this group as their parent component, so their
/// `owner_object()` resolves through the group. Scene hooks are forwarded.
pub struct ComponentGroup {
    core: ComponentCore,
    self_ref: Weak<ComponentGroup>,
    children: Mutex<Vec<Arc<dyn Component>>>,
}

impl ComponentGroup {
    pub fn new(component_type: ComponentType) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core: ComponentCore::new(component_type),
            self_ref: self_ref.clone(),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn add_child_component(&self, child: Arc<dyn Component>) {
        let parent: Weak<dyn Component> = self.self_ref.clone();
        child.core().set_parent(Some(parent));
        self.children.lock().push(child);
    }

    pub fn remove_child_component(&self, child: &Arc<dyn Component>) -> bool {
        let mut children = self.children.lock();
        let Some(at) = children.iter().position(|c| same_component(c, child)) else {
            return false;
        };
        children.remove(at);
        child.core().set_parent(None);
        true
    }

    pub fn children(&self) -> Vec<Arc<dyn Component>> {
        self.children.lock().clone()
    }
}

impl Component for ComponentGroup {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_added_to_scene(&self, scene: &Scene) {
        for child in self.children() {
            child.on_added_to_scene(scene);
        }
    }

    fn on_removed_from_scene(&self, scene: &Scene) {
        for child in self.children() {
            child.on_removed_from_scene(scene);
        }
    }
}
