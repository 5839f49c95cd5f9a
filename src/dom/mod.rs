//! Headless DOM
//!
//! A small arena of element nodes keyed by [`NodeId`]. It models what the
//! controller and the attribute propagator need from a document: a light
//! tree with open shadow roots and named slots, a custom element registry
//! with deferred upgrades, bubbling/composed events, mutation records
//! delivered on the next microtask, and the document-level fullscreen and
//! picture-in-picture state the store queries through [`DocumentRoot`].

pub mod element;

pub use element::DomElement;

use crate::error::{Error, Result};
use crate::platform::{
    same_rc, DocumentRoot, Element, EventTarget, Listener, ListenerSet, MediaEvent, NodeId,
};
use crate::requests::Detail;
use crate::state::StateValue;
use crate::tasks::TaskQueue;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Local name reported for shadow root nodes.
pub const SHADOW_ROOT_NAME: &str = "#shadow-root";
const DOCUMENT_NAME: &str = "#document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Document,
    Element,
    ShadowRoot,
}

struct Node {
    kind: NodeKind,
    local_name: String,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, StateValue>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow_root: Option<NodeId>,
    host: Option<NodeId>,
    upgraded: bool,
    listeners: Rc<ListenerSet>,
    /// Set for nodes that stand in for an element living outside the arena.
    external: Option<Rc<dyn Element>>,
}

impl Node {
    fn new(kind: NodeKind, local_name: &str, upgraded: bool) -> Self {
        Node {
            kind,
            local_name: local_name.to_string(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            host: None,
            upgraded,
            listeners: Rc::new(ListenerSet::new()),
            external: None,
        }
    }
}

/// What a custom element declares when it is defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementDefinition {
    /// Attributes the element reacts to.
    pub observed_attributes: Vec<String>,
    /// Properties the element exposes once upgraded.
    pub properties: Vec<String>,
}

impl ElementDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observed_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }
}

/// A key press carried by `keydown` / `keyup` events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPress {
    pub key: String,
    pub meta: bool,
    pub alt: bool,
}

impl KeyPress {
    pub fn new(key: &str) -> Self {
        KeyPress {
            key: key.to_string(),
            ..KeyPress::default()
        }
    }
}

/// Payload of a [`DomEvent`].
#[derive(Debug, Clone, Default)]
pub enum EventDetail {
    #[default]
    None,
    /// A media request dispatched by a control.
    Request(Detail),
    /// The new value carried by a `<key>change` event.
    State(StateValue),
    Key(KeyPress),
}

/// An event travelling through the arena.
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub kind: String,
    pub target: NodeId,
    pub detail: EventDetail,
    pub bubbles: bool,
    /// Crosses shadow root boundaries while bubbling.
    pub composed: bool,
    default_prevented: Rc<Cell<bool>>,
}

impl DomEvent {
    /// A non-bubbling event seen only by listeners on `target`.
    pub fn new(kind: &str, target: NodeId) -> Self {
        DomEvent {
            kind: kind.to_string(),
            target,
            detail: EventDetail::None,
            bubbles: false,
            composed: false,
            default_prevented: Rc::new(Cell::new(false)),
        }
    }

    /// A bubbling, composed event.
    pub fn bubbling(kind: &str, target: NodeId) -> Self {
        DomEvent {
            bubbles: true,
            composed: true,
            ..DomEvent::new(kind, target)
        }
    }

    /// A non-bubbling event that still crosses shadow boundaries when
    /// re-dispatched from a host.
    pub fn composed(kind: &str, target: NodeId) -> Self {
        DomEvent {
            composed: true,
            ..DomEvent::new(kind, target)
        }
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

pub type DomListener = Rc<dyn Fn(&DomEvent)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

pub type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;

/// Handle returned by [`Document::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    root: NodeId,
    callback: MutationCallback,
    pending: Vec<MutationRecord>,
}

/// Custom element lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connected,
    Disconnected,
    AttributeChanged {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

pub type LifecycleHook = Rc<dyn Fn(&Lifecycle)>;

/// The document: owner of every node in the arena.
pub struct Document {
    id: NodeId,
    this: Weak<Document>,
    tasks: TaskQueue,
    nodes: RefCell<BTreeMap<NodeId, Node>>,
    definitions: RefCell<BTreeMap<String, ElementDefinition>>,
    when_defined: RefCell<BTreeMap<String, Vec<Box<dyn FnOnce()>>>>,
    listeners: ListenerSet,
    dom_listeners: RefCell<Vec<(NodeId, String, DomListener)>>,
    hooks: RefCell<BTreeMap<NodeId, LifecycleHook>>,
    observers: RefCell<Vec<Observer>>,
    next_observer: Cell<u64>,
    delivery_scheduled: Cell<bool>,
    fullscreen_enabled: Cell<bool>,
    pip_enabled: Cell<bool>,
    fullscreen: RefCell<Option<Rc<dyn Element>>>,
    pip: RefCell<Option<Rc<dyn Element>>>,
}

impl Document {
    pub fn new(tasks: TaskQueue) -> Rc<Self> {
        let id = NodeId::next();
        let mut nodes = BTreeMap::new();
        nodes.insert(id, Node::new(NodeKind::Document, DOCUMENT_NAME, true));
        Rc::new_cyclic(|this| Document {
            id,
            this: this.clone(),
            tasks,
            nodes: RefCell::new(nodes),
            definitions: RefCell::new(BTreeMap::new()),
            when_defined: RefCell::new(BTreeMap::new()),
            listeners: ListenerSet::new(),
            dom_listeners: RefCell::new(Vec::new()),
            hooks: RefCell::new(BTreeMap::new()),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(1),
            delivery_scheduled: Cell::new(false),
            fullscreen_enabled: Cell::new(true),
            pip_enabled: Cell::new(true),
            fullscreen: RefCell::new(None),
            pip: RefCell::new(None),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// The document as a trait object for the store and media owners.
    pub fn as_root(&self) -> Option<Rc<dyn DocumentRoot>> {
        let this: Rc<dyn DocumentRoot> = self.this.upgrade()?;
        Some(this)
    }

    pub fn set_fullscreen_enabled(&self, enabled: bool) {
        self.fullscreen_enabled.set(enabled);
    }

    pub fn set_picture_in_picture_enabled(&self, enabled: bool) {
        self.pip_enabled.set(enabled);
    }

    // ---- tree ----

    /// Create a detached element. Custom elements start un-upgraded unless
    /// their name is already defined.
    pub fn create_element(&self, local_name: &str) -> NodeId {
        let name = local_name.to_ascii_lowercase();
        let upgraded = !name.contains('-') || self.is_defined(&name);
        let id = NodeId::next();
        self.nodes
            .borrow_mut()
            .insert(id, Node::new(NodeKind::Element, &name, upgraded));
        id
    }

    /// Handle for an element node.
    pub fn element(&self, id: NodeId) -> Option<DomElement> {
        let is_element = self
            .nodes
            .borrow()
            .get(&id)
            .is_some_and(|n| n.kind == NodeKind::Element);
        is_element.then(|| DomElement::new(self.this.clone(), id))
    }

    /// Place an element that lives outside the arena (such as a media owner)
    /// into the tree so composed containment queries see it.
    pub fn adopt(&self, parent: NodeId, element: &Rc<dyn Element>) -> Result<()> {
        let id = element.node_id();
        {
            let mut nodes = self.nodes.borrow_mut();
            if !nodes.contains_key(&id) {
                let mut node = Node::new(NodeKind::Element, &element.local_name(), true);
                node.external = Some(element.clone());
                nodes.insert(id, node);
            }
        }
        self.append_child(parent, id)
    }

    /// The element (arena or adopted) behind `id`.
    pub fn element_handle(&self, id: NodeId) -> Option<Rc<dyn Element>> {
        let external = self
            .nodes
            .borrow()
            .get(&id)
            .and_then(|n| n.external.clone());
        if external.is_some() {
            return external;
        }
        self.element(id).map(|el| {
            let el: Rc<dyn Element> = Rc::new(el);
            el
        })
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if parent == child || self.contains_composed(child, parent) {
            return Err(Error::InvalidState("cannot insert a node into itself".into()));
        }
        {
            let nodes = self.nodes.borrow();
            let parent_node = nodes
                .get(&parent)
                .ok_or_else(|| Error::InvalidState("unknown parent node".into()))?;
            let child_node = nodes
                .get(&child)
                .ok_or_else(|| Error::InvalidState("unknown child node".into()))?;
            if child_node.kind != NodeKind::Element {
                return Err(Error::InvalidState(format!(
                    "cannot insert {}",
                    child_node.local_name
                )));
            }
            if parent_node.external.is_some() {
                return Err(Error::NotSupported("children of adopted elements".into()));
            }
        }
        if self.parent(child).is_some() {
            self.remove(child);
        }
        {
            let mut nodes = self.nodes.borrow_mut();
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
            if let Some(node) = nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
        }
        self.queue_record(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
        if self.is_connected(parent) {
            self.notify_subtree(child, &Lifecycle::Connected);
        }
        self.slot_changed_for(parent, child);
        Ok(())
    }

    /// Detach `node` from its parent. Detached nodes stay in the arena and
    /// can be inserted again.
    pub fn remove(&self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let was_connected = self.is_connected(node);
        {
            let mut nodes = self.nodes.borrow_mut();
            if let Some(p) = nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
            if let Some(n) = nodes.get_mut(&node) {
                n.parent = None;
            }
        }
        self.queue_record(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![node],
            },
        });
        if was_connected {
            self.notify_subtree(node, &Lifecycle::Disconnected);
        }
        self.slot_changed_for(parent, node);
    }

    pub fn attach_shadow(&self, host: NodeId) -> Result<NodeId> {
        let id = NodeId::next();
        let mut nodes = self.nodes.borrow_mut();
        let host_node = nodes
            .get_mut(&host)
            .ok_or_else(|| Error::InvalidState("unknown host".into()))?;
        if host_node.kind != NodeKind::Element || host_node.external.is_some() {
            return Err(Error::NotSupported(format!(
                "attachShadow on {}",
                host_node.local_name
            )));
        }
        if host_node.shadow_root.is_some() {
            return Err(Error::InvalidState("shadow root already attached".into()));
        }
        host_node.shadow_root = Some(id);
        let mut root = Node::new(NodeKind::ShadowRoot, SHADOW_ROOT_NAME, true);
        root.host = Some(host);
        nodes.insert(id, root);
        Ok(id)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&host).and_then(|n| n.shadow_root)
    }

    pub fn is_shadow_root(&self, node: NodeId) -> bool {
        self.nodes
            .borrow()
            .get(&node)
            .is_some_and(|n| n.kind == NodeKind::ShadowRoot)
    }

    pub fn host(&self, shadow_root: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&shadow_root).and_then(|n| n.host)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn local_name(&self, node: NodeId) -> Option<String> {
        self.nodes.borrow().get(&node).map(|n| n.local_name.clone())
    }

    /// Parent in the composed tree: the light parent, or the host of a
    /// shadow root.
    fn composed_parent(&self, node: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.borrow();
        let n = nodes.get(&node)?;
        n.parent.or(n.host)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.id {
                return true;
            }
            current = self.composed_parent(id);
        }
        false
    }

    /// `node`, its descendants and everything inside their shadow roots.
    pub fn composed_subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            let nodes = self.nodes.borrow();
            let Some(n) = nodes.get(&id) else {
                continue;
            };
            stack.extend(n.children.iter().rev().copied());
            if let Some(shadow) = n.shadow_root {
                stack.push(shadow);
            }
        }
        out
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self
            .nodes
            .borrow()
            .iter()
            .filter(|(_, n)| n.attributes.get("id").is_some_and(|v| v == id))
            .map(|(node_id, _)| *node_id)
            .collect();
        candidates.into_iter().find(|n| self.is_connected(*n))
    }

    // ---- attributes and properties ----

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.nodes
            .borrow()
            .get(&node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }

    pub fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .borrow()
            .get(&node)
            .map(|n| n.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let old = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(n) = nodes.get_mut(&node) else {
                return;
            };
            n.attributes.insert(name.clone(), value.to_string())
        };
        if old.as_deref() == Some(value) {
            return;
        }
        self.attribute_changed(node, name, old, Some(value.to_string()));
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let old = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(n) = nodes.get_mut(&node) else {
                return;
            };
            n.attributes.remove(&name)
        };
        if old.is_some() {
            self.attribute_changed(node, name, old, None);
        }
    }

    /// Set or remove a boolean attribute.
    pub fn toggle_attribute(&self, node: NodeId, name: &str, present: bool) {
        if present {
            self.set_attribute(node, name, "");
        } else {
            self.remove_attribute(node, name);
        }
    }

    fn attribute_changed(&self, node: NodeId, name: String, old: Option<String>, new: Option<String>) {
        self.queue_record(MutationRecord {
            target: node,
            kind: MutationKind::Attributes { name: name.clone() },
        });
        if name == "slot" {
            if let Some(parent) = self.parent(node) {
                self.fire_slotchange(parent, old.as_deref().unwrap_or_default());
                self.fire_slotchange(parent, new.as_deref().unwrap_or_default());
            }
        }
        let hook = self.hooks.borrow().get(&node).cloned();
        if let Some(hook) = hook {
            hook(&Lifecycle::AttributeChanged { name, old, new });
        }
    }

    pub fn has_property(&self, node: NodeId, name: &str) -> bool {
        let local_name = {
            let nodes = self.nodes.borrow();
            match nodes.get(&node) {
                Some(n) if n.upgraded => n.local_name.clone(),
                _ => return false,
            }
        };
        self.definitions
            .borrow()
            .get(&local_name)
            .is_some_and(|d| d.properties.iter().any(|p| p == name))
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: StateValue) {
        if let Some(n) = self.nodes.borrow_mut().get_mut(&node) {
            n.properties.insert(name.to_string(), value);
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<StateValue> {
        self.nodes
            .borrow()
            .get(&node)
            .and_then(|n| n.properties.get(name).cloned())
    }

    // ---- custom elements ----

    /// Define a custom element, upgrading every existing instance and
    /// resolving pending `when_defined` waiters.
    pub fn define(&self, name: &str, definition: ElementDefinition) -> Result<()> {
        let name = name.to_ascii_lowercase();
        if !name.contains('-') || name.starts_with('-') {
            return Err(Error::Config(format!("invalid custom element name {name:?}")));
        }
        {
            let mut definitions = self.definitions.borrow_mut();
            if definitions.contains_key(&name) {
                return Err(Error::Config(format!("{name} is already defined")));
            }
            definitions.insert(name.clone(), definition);
        }
        for node in self.nodes.borrow_mut().values_mut() {
            if node.local_name == name {
                node.upgraded = true;
            }
        }
        log::debug!("defined custom element {name}");
        let waiters = self
            .when_defined
            .borrow_mut()
            .remove(&name)
            .unwrap_or_default();
        for waiter in waiters {
            waiter();
        }
        Ok(())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.borrow().contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Option<ElementDefinition> {
        self.definitions.borrow().get(name).cloned()
    }

    pub fn when_defined(&self, name: &str, callback: Box<dyn FnOnce()>) {
        if self.is_defined(name) {
            callback();
            return;
        }
        self.when_defined
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(callback);
    }

    pub fn is_upgraded(&self, node: NodeId) -> bool {
        self.nodes.borrow().get(&node).is_some_and(|n| n.upgraded)
    }

    pub fn set_lifecycle_hook(&self, node: NodeId, hook: LifecycleHook) {
        self.hooks.borrow_mut().insert(node, hook);
    }

    pub fn clear_lifecycle_hook(&self, node: NodeId) {
        self.hooks.borrow_mut().remove(&node);
    }

    fn notify_subtree(&self, node: NodeId, event: &Lifecycle) {
        let hooks: Vec<LifecycleHook> = {
            let hooks = self.hooks.borrow();
            self.composed_subtree(node)
                .iter()
                .filter_map(|id| hooks.get(id).cloned())
                .collect()
        };
        for hook in hooks {
            hook(event);
        }
    }

    // ---- slots ----

    /// Elements assigned to a `<slot>`: children of the shadow host whose
    /// `slot` attribute matches the slot's `name` (both default to "").
    pub fn assigned_nodes(&self, slot: NodeId) -> Vec<NodeId> {
        let Some(host) = self.slot_host(slot) else {
            return Vec::new();
        };
        let name = self.attribute(slot, "name").unwrap_or_default();
        self.children(host)
            .into_iter()
            .filter(|c| self.attribute(*c, "slot").unwrap_or_default() == name)
            .collect()
    }

    /// The host whose shadow tree contains `slot`.
    fn slot_host(&self, slot: NodeId) -> Option<NodeId> {
        if self.local_name(slot).as_deref() != Some("slot") {
            return None;
        }
        let mut current = self.parent(slot);
        while let Some(id) = current {
            if self.is_shadow_root(id) {
                return self.host(id);
            }
            current = self.parent(id);
        }
        None
    }

    fn slots_named(&self, host: NodeId, name: &str) -> Vec<NodeId> {
        let Some(shadow) = self.shadow_root(host) else {
            return Vec::new();
        };
        self.composed_subtree(shadow)
            .into_iter()
            .filter(|n| {
                self.local_name(*n).as_deref() == Some("slot")
                    && self.attribute(*n, "name").unwrap_or_default() == name
            })
            .collect()
    }

    fn slot_changed_for(&self, host: NodeId, child: NodeId) {
        let name = self.attribute(child, "slot").unwrap_or_default();
        self.fire_slotchange(host, &name);
    }

    fn fire_slotchange(&self, host: NodeId, name: &str) {
        for slot in self.slots_named(host, name) {
            let event = DomEvent {
                bubbles: true,
                ..DomEvent::new("slotchange", slot)
            };
            self.dispatch(&event);
        }
    }

    // ---- events ----

    pub fn add_listener(&self, node: NodeId, kind: &str, listener: DomListener) {
        let mut listeners = self.dom_listeners.borrow_mut();
        let exists = listeners
            .iter()
            .any(|(n, k, l)| *n == node && k == kind && same_rc(l, &listener));
        if !exists {
            listeners.push((node, kind.to_string(), listener));
        }
    }

    pub fn remove_listener(&self, node: NodeId, kind: &str, listener: &DomListener) {
        self.dom_listeners
            .borrow_mut()
            .retain(|(n, k, l)| !(*n == node && k == kind && same_rc(l, listener)));
    }

    /// Listeners registered on `node` across all event kinds.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.dom_listeners
            .borrow()
            .iter()
            .filter(|(n, _, _)| *n == node)
            .count()
    }

    fn event_path(&self, event: &DomEvent) -> Vec<NodeId> {
        let mut path = vec![event.target];
        if !event.bubbles {
            return path;
        }
        let nodes = self.nodes.borrow();
        let mut current = event.target;
        while let Some(node) = nodes.get(&current) {
            let next = match node.kind {
                NodeKind::ShadowRoot if event.composed => node.host,
                NodeKind::ShadowRoot => None,
                _ => node.parent,
            };
            let Some(next) = next else {
                break;
            };
            path.push(next);
            current = next;
        }
        path
    }

    /// Dispatch along the event path. Returns false if a listener called
    /// [`DomEvent::prevent_default`].
    pub fn dispatch(&self, event: &DomEvent) -> bool {
        for node in self.event_path(event) {
            let listeners: Vec<DomListener> = self
                .dom_listeners
                .borrow()
                .iter()
                .filter(|(n, k, _)| *n == node && *k == event.kind)
                .map(|(_, _, l)| l.clone())
                .collect();
            for listener in listeners {
                listener(event);
            }
        }
        !event.default_prevented()
    }

    /// Emit a native [`MediaEvent`] on an arena element.
    pub fn emit_on(&self, node: NodeId, event: &MediaEvent) {
        let listeners = self.nodes.borrow().get(&node).map(|n| n.listeners.clone());
        if let Some(listeners) = listeners {
            listeners.emit(event);
        }
    }

    pub(crate) fn node_listeners(&self, node: NodeId) -> Option<Rc<ListenerSet>> {
        self.nodes.borrow().get(&node).map(|n| n.listeners.clone())
    }

    // ---- mutation observers ----

    /// Observe child list and attribute changes of `root` and its light
    /// descendants. Records arrive batched on the next microtask.
    pub fn observe(&self, root: NodeId, callback: MutationCallback) -> ObserverId {
        let id = ObserverId(self.next_observer.get());
        self.next_observer.set(id.0 + 1);
        self.observers.borrow_mut().push(Observer {
            id,
            root,
            callback,
            pending: Vec::new(),
        });
        id
    }

    pub fn disconnect(&self, observer: ObserverId) {
        self.observers.borrow_mut().retain(|o| o.id != observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn queue_record(&self, record: MutationRecord) {
        let mut ancestors = vec![record.target];
        let mut current = self.parent(record.target);
        while let Some(id) = current {
            ancestors.push(id);
            current = self.parent(id);
        }
        let mut queued = false;
        for observer in self.observers.borrow_mut().iter_mut() {
            if ancestors.contains(&observer.root) {
                observer.pending.push(record.clone());
                queued = true;
            }
        }
        if queued && !self.delivery_scheduled.replace(true) {
            let this = self.this.clone();
            self.tasks.queue(move || {
                if let Some(document) = this.upgrade() {
                    document.deliver_mutations();
                }
            });
        }
    }

    fn deliver_mutations(&self) {
        self.delivery_scheduled.set(false);
        let batches: Vec<(MutationCallback, Vec<MutationRecord>)> = self
            .observers
            .borrow_mut()
            .iter_mut()
            .filter(|o| !o.pending.is_empty())
            .map(|o| (o.callback.clone(), std::mem::take(&mut o.pending)))
            .collect();
        for (callback, records) in batches {
            callback(&records);
        }
    }

    fn emit_root(&self, kind: &str) {
        self.listeners.emit(&MediaEvent::new(kind));
    }
}

impl EventTarget for Document {
    fn add_event_listener(&self, kind: &str, listener: Listener) {
        self.listeners.add(kind, listener);
    }

    fn remove_event_listener(&self, kind: &str, listener: &Listener) {
        self.listeners.remove(kind, listener);
    }

    fn dispatch_event(&self, event: &MediaEvent) {
        self.listeners.emit(event);
    }
}

impl DocumentRoot for Document {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn fullscreen_enabled(&self) -> bool {
        self.fullscreen_enabled.get()
    }

    fn fullscreen_element(&self) -> Option<Rc<dyn Element>> {
        self.fullscreen.borrow().clone()
    }

    fn enter_fullscreen(&self, element: Rc<dyn Element>) -> Result<()> {
        if !self.fullscreen_enabled.get() {
            return Err(Error::NotSupported("fullscreen is not enabled".into()));
        }
        log::debug!("{} entered fullscreen", element.local_name());
        *self.fullscreen.borrow_mut() = Some(element);
        self.emit_root("fullscreenchange");
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<()> {
        if self.fullscreen.borrow_mut().take().is_none() {
            return Err(Error::InvalidState("document is not in fullscreen".into()));
        }
        self.emit_root("fullscreenchange");
        Ok(())
    }

    fn picture_in_picture_enabled(&self) -> bool {
        self.pip_enabled.get()
    }

    fn picture_in_picture_element(&self) -> Option<Rc<dyn Element>> {
        self.pip.borrow().clone()
    }

    fn enter_picture_in_picture(&self, element: Rc<dyn Element>) -> Result<()> {
        if !self.pip_enabled.get() {
            return Err(Error::NotSupported("picture-in-picture is not enabled".into()));
        }
        let previous = self.pip.borrow_mut().replace(element.clone());
        if let Some(previous) = previous {
            if previous.node_id() != element.node_id() {
                previous.dispatch_event(&MediaEvent::new("leavepictureinpicture"));
            }
        }
        element.dispatch_event(&MediaEvent::new("enterpictureinpicture"));
        Ok(())
    }

    fn exit_picture_in_picture(&self) -> Result<()> {
        let Some(element) = self.pip.borrow_mut().take() else {
            return Err(Error::InvalidState("no picture-in-picture element".into()));
        };
        element.dispatch_event(&MediaEvent::new("leavepictureinpicture"));
        Ok(())
    }

    fn contains_composed(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.composed_parent(id);
        }
        false
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("nodes", &self.nodes.borrow().len())
            .field("definitions", &self.definitions.borrow().len())
            .finish()
    }
}
