//! Attribute propagator
//!
//! Pushes store snapshots into DOM receivers. A receiver is an element that
//! either exposes media state properties (declared by its custom element
//! definition) or lists the state attributes it cares about, through its
//! definition's observed attributes or a `mediachromeattributes` attribute.
//!
//! Receivers are kept in an explicit [`Receivers`] registry. Elements opt in
//! with a bubbling `registermediastatereceiver` event, and a [`Monitor`] also
//! watches mutation records and slot changes under a root. Custom elements
//! that are not defined yet go into a deferred queue. Once their definition
//! lands, the queue is drained on a single microtask.

use crate::captions::{stringify_audio_track_list, stringify_rendition_list, stringify_text_track_list};
use crate::dom::{Document, DomEvent, DomListener, MutationKind, MutationRecord, ObserverId};
use crate::error::{Error, Result};
use crate::mediator::format_number;
use crate::platform::NodeId;
use crate::state::{MediaState, StateKey, StateValue};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub const REGISTER_RECEIVER: &str = "registermediastatereceiver";
pub const UNREGISTER_RECEIVER: &str = "unregistermediastatereceiver";
/// Attribute listing the state attributes a plain element wants.
pub const MEDIA_CHROME_ATTRIBUTES: &str = "mediachromeattributes";
/// Slot (and `slot` attribute value) reserved for the media itself.
pub const MEDIA_SLOT: &str = "media";

/// Render a state value as attribute text. `None` removes the attribute.
pub fn serialize_attribute(value: &StateValue) -> Option<String> {
    if value.is_empty_list() {
        return None;
    }
    match value {
        StateValue::Unset | StateValue::Bool(false) => None,
        StateValue::Bool(true) => Some(String::new()),
        StateValue::Number(n) if n.is_nan() => None,
        StateValue::Number(n) => Some(format_number(*n)),
        StateValue::Text(s) => Some(s.clone()),
        StateValue::Range(start, end) => Some(tuple(*start, *end)),
        StateValue::Ranges(ranges) => Some(
            ranges
                .iter()
                .map(|(start, end)| tuple(*start, *end))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        StateValue::Coords(coords) => Some(
            coords
                .iter()
                .map(|c| format_number(*c))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        StateValue::TextTracks(tracks) => Some(stringify_text_track_list(tracks)),
        StateValue::Renditions(renditions) => Some(stringify_rendition_list(renditions)),
        StateValue::AudioTracks(tracks) => Some(stringify_audio_track_list(tracks)),
        StateValue::Error(error) => Some(error.code.to_string()),
        // Cue lists only travel as properties.
        StateValue::Cues(_) => None,
    }
}

fn tuple(start: f64, end: f64) -> String {
    format!("{}:{}", format_number(start), format_number(end))
}

/// State attribute names an element declares interest in.
pub fn media_ui_attributes(doc: &Document, node: NodeId) -> Vec<String> {
    let declared = doc
        .local_name(node)
        .filter(|_| doc.is_upgraded(node))
        .and_then(|name| doc.definition(&name))
        .map(|d| d.observed_attributes)
        .filter(|attrs| !attrs.is_empty());
    let declared = match declared {
        Some(attrs) => attrs,
        None => doc
            .attribute(node, MEDIA_CHROME_ATTRIBUTES)
            .map(|list| list.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    };
    declared
        .into_iter()
        .filter(|attr| StateKey::from_attribute(attr).is_some_and(|k| k.attribute_name() == *attr))
        .collect()
}

/// True when the element's definition exposes any state property.
pub fn has_media_ui_props(doc: &Document, node: NodeId) -> bool {
    StateKey::ALL
        .iter()
        .any(|key| doc.has_property(node, key.as_str()))
}

pub fn is_receiver(doc: &Document, node: NodeId) -> bool {
    has_media_ui_props(doc, node) || !media_ui_attributes(doc, node).is_empty()
}

/// Inside an element placed in the media slot (light tree only).
fn in_media_slot(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if doc.attribute(id, "slot").as_deref() == Some(MEDIA_SLOT) {
            return true;
        }
        current = doc.parent(id);
    }
    false
}

/// Write one key to one element: a live property wins, then a declared
/// attribute. Writes to disconnected elements wait one microtask.
pub fn propagate_to(doc: &Rc<Document>, node: NodeId, key: StateKey, value: &StateValue) {
    if doc.has_property(node, key.as_str()) {
        doc.set_property(node, key.as_str(), value.clone());
        return;
    }
    let attr = key.attribute_name();
    if !media_ui_attributes(doc, node).contains(&attr) {
        return;
    }
    let serialized = serialize_attribute(value);
    if doc.is_connected(node) {
        write_attribute(doc, node, &attr, serialized.as_deref());
        return;
    }
    let weak = Rc::downgrade(doc);
    doc.tasks().queue(move || {
        if let Some(doc) = weak.upgrade() {
            write_attribute(&doc, node, &attr, serialized.as_deref());
        }
    });
}

fn write_attribute(doc: &Document, node: NodeId, attr: &str, value: Option<&str>) {
    match value {
        Some(text) => doc.set_attribute(node, attr, text),
        None => doc.remove_attribute(node, attr),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discovery {
    Register,
    Unregister,
}

/// The set of elements a controller keeps in sync with its store.
pub struct Receivers {
    document: Weak<Document>,
    this: Weak<Receivers>,
    nodes: RefCell<Vec<NodeId>>,
    state: RefCell<MediaState>,
    deferred: RefCell<Vec<(NodeId, Discovery)>>,
    flush_scheduled: Cell<bool>,
}

impl Receivers {
    pub fn new(document: &Rc<Document>) -> Rc<Self> {
        Rc::new_cyclic(|this| Receivers {
            document: Rc::downgrade(document),
            this: this.clone(),
            nodes: RefCell::new(Vec::new()),
            state: RefCell::new(MediaState::default()),
            deferred: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
        })
    }

    /// Add a receiver and bring it up to date with the current snapshot.
    pub fn register(&self, node: NodeId) {
        {
            let mut nodes = self.nodes.borrow_mut();
            if nodes.contains(&node) {
                return;
            }
            nodes.push(node);
        }
        log::trace!("registered media state receiver {}", node.raw());
        let Some(doc) = self.document.upgrade() else {
            return;
        };
        let state = self.state.borrow().clone();
        for (key, value) in state.iter() {
            propagate_to(&doc, node, *key, value);
        }
    }

    pub fn unregister(&self, node: NodeId) {
        self.nodes.borrow_mut().retain(|n| *n != node);
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.borrow().contains(&node)
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Remember the snapshot replayed to receivers registered later.
    pub fn set_state(&self, state: MediaState) {
        *self.state.borrow_mut() = state;
    }

    /// Push one key to every receiver.
    pub fn propagate(&self, key: StateKey, value: &StateValue) {
        let Some(doc) = self.document.upgrade() else {
            return;
        };
        for node in self.nodes() {
            propagate_to(&doc, node, key, value);
        }
    }

    /// Register every receiver at or below `root`.
    pub fn discover(&self, root: NodeId) {
        self.walk(root, Discovery::Register);
    }

    /// Unregister every receiver at or below `root`.
    pub fn forget(&self, root: NodeId) {
        self.walk(root, Discovery::Unregister);
    }

    fn apply(&self, node: NodeId, action: Discovery) {
        match action {
            Discovery::Register => self.register(node),
            Discovery::Unregister => self.unregister(node),
        }
    }

    fn walk(&self, root: NodeId, action: Discovery) {
        let Some(doc) = self.document.upgrade() else {
            return;
        };
        if in_media_slot(&doc, root) {
            return;
        }
        let name = doc.local_name(root).unwrap_or_default();
        if name.contains('-') && !doc.is_upgraded(root) && !is_receiver(&doc, root) {
            self.defer(&doc, &name, root, action);
            return;
        }
        if is_receiver(&doc, root) {
            self.apply(root, action);
        }
        let mut children = doc.children(root);
        if let Some(shadow) = doc.shadow_root(root) {
            children.extend(doc.children(shadow));
        }
        if name == "slot" {
            children.extend(doc.assigned_nodes(root));
        }
        for child in children {
            self.walk(child, action);
        }
    }

    fn defer(&self, doc: &Rc<Document>, name: &str, node: NodeId, action: Discovery) {
        let this = self.this.clone();
        let tasks = doc.tasks().clone();
        doc.when_defined(
            name,
            Box::new(move || {
                let Some(receivers) = this.upgrade() else {
                    return;
                };
                receivers.deferred.borrow_mut().push((node, action));
                if receivers.flush_scheduled.replace(true) {
                    return;
                }
                let this = receivers.this.clone();
                tasks.queue(move || {
                    if let Some(receivers) = this.upgrade() {
                        receivers.flush_deferred();
                    }
                });
            }),
        );
    }

    fn flush_deferred(&self) {
        self.flush_scheduled.set(false);
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        for (node, action) in pending {
            self.walk(node, action);
        }
    }

    pub fn pending_discoveries(&self) -> usize {
        self.deferred.borrow().len()
    }
}

impl std::fmt::Debug for Receivers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receivers")
            .field("nodes", &self.nodes.borrow())
            .finish()
    }
}

/// Keeps a [`Receivers`] registry in sync with the subtree under a root
/// until [`Monitor::stop`] is called.
pub struct Monitor {
    document: Weak<Document>,
    root: NodeId,
    receivers: Rc<Receivers>,
    listeners: Vec<(NodeId, &'static str, DomListener)>,
    observers: Vec<ObserverId>,
}

impl Monitor {
    /// Discover receivers under `root` and start watching it.
    pub fn start(doc: &Rc<Document>, root: NodeId, receivers: &Rc<Receivers>) -> Result<Monitor> {
        if doc.local_name(root).is_none() {
            return Err(Error::InvalidState("cannot monitor an unknown node".into()));
        }
        receivers.discover(root);

        let mut listeners: Vec<(NodeId, &'static str, DomListener)> = Vec::new();
        let r = receivers.clone();
        listeners.push((
            root,
            REGISTER_RECEIVER,
            Rc::new(move |event: &DomEvent| r.register(event.target)),
        ));
        let r = receivers.clone();
        listeners.push((
            root,
            UNREGISTER_RECEIVER,
            Rc::new(move |event: &DomEvent| r.unregister(event.target)),
        ));

        let slotted: Rc<RefCell<Vec<NodeId>>> = Rc::new(RefCell::new(Vec::new()));
        let r = receivers.clone();
        let weak = Rc::downgrade(doc);
        let on_slotchange: DomListener = Rc::new(move |event: &DomEvent| {
            let Some(doc) = weak.upgrade() else {
                return;
            };
            if doc.attribute(event.target, "name").as_deref() == Some(MEDIA_SLOT) {
                return;
            }
            let previous = std::mem::take(&mut *slotted.borrow_mut());
            for node in previous {
                r.forget(node);
            }
            let assigned = doc.assigned_nodes(event.target);
            *slotted.borrow_mut() = assigned.clone();
            for node in assigned {
                r.discover(node);
            }
        });
        listeners.push((root, "slotchange", on_slotchange.clone()));

        let mut watched = vec![root];
        if let Some(shadow) = doc.shadow_root(root) {
            // slotchange does not leave the shadow tree it fires in.
            listeners.push((shadow, "slotchange", on_slotchange));
            watched.push(shadow);
        }
        for (node, kind, listener) in &listeners {
            doc.add_listener(*node, kind, listener.clone());
        }

        let observers = watched
            .into_iter()
            .map(|node| {
                let r = receivers.clone();
                let weak = Rc::downgrade(doc);
                doc.observe(
                    node,
                    Rc::new(move |records: &[MutationRecord]| {
                        if let Some(doc) = weak.upgrade() {
                            apply_mutations(&doc, &r, records);
                        }
                    }),
                )
            })
            .collect();

        Ok(Monitor {
            document: Rc::downgrade(doc),
            root,
            receivers: receivers.clone(),
            listeners,
            observers,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Unregister everything under the root and drop all watchers.
    pub fn stop(self) {
        self.receivers.forget(self.root);
        let Some(doc) = self.document.upgrade() else {
            return;
        };
        for (node, kind, listener) in &self.listeners {
            doc.remove_listener(*node, kind, listener);
        }
        for observer in &self.observers {
            doc.disconnect(*observer);
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("root", &self.root)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn apply_mutations(doc: &Document, receivers: &Receivers, records: &[MutationRecord]) {
    for record in records {
        match &record.kind {
            MutationKind::ChildList { added, removed } => {
                for node in added {
                    receivers.discover(*node);
                }
                for node in removed {
                    receivers.forget(*node);
                }
            }
            MutationKind::Attributes { name } if name == MEDIA_CHROME_ATTRIBUTES => {
                if is_receiver(doc, record.target) {
                    receivers.register(record.target);
                } else {
                    receivers.unregister(record.target);
                }
            }
            MutationKind::Attributes { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementDefinition;
    use crate::state::{TextTrackInfo, TrackKind};
    use crate::tasks::TaskQueue;
    use std::collections::BTreeMap;

    fn document() -> Rc<Document> {
        Document::new(TaskQueue::new())
    }

    fn snapshot(values: &[(StateKey, StateValue)]) -> MediaState {
        MediaState::from_map(values.iter().cloned().collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn serializes_by_value_shape() {
        assert_eq!(serialize_attribute(&StateValue::Bool(true)), Some(String::new()));
        assert_eq!(serialize_attribute(&StateValue::Bool(false)), None);
        assert_eq!(serialize_attribute(&StateValue::Number(f64::NAN)), None);
        assert_eq!(serialize_attribute(&StateValue::Number(2.5)), Some("2.5".into()));
        assert_eq!(serialize_attribute(&StateValue::Range(0.0, 120.0)), Some("0:120".into()));
        assert_eq!(
            serialize_attribute(&StateValue::Ranges(vec![(0.0, 1.5), (3.0, 4.0)])),
            Some("0:1.5 3:4".into())
        );
        assert_eq!(serialize_attribute(&StateValue::Ranges(Vec::new())), None);
        assert_eq!(
            serialize_attribute(&StateValue::Coords(vec![0.0, 90.0, 160.0, 90.0])),
            Some("0 90 160 90".into())
        );
        let tracks = vec![TextTrackInfo::new(TrackKind::Subtitles, "en", "English")];
        assert_eq!(
            serialize_attribute(&StateValue::TextTracks(tracks)),
            Some("en:English".into())
        );
    }

    #[test]
    fn declared_attributes_are_filtered_to_state_keys() {
        let doc = document();
        let div = doc.create_element("div");
        doc.set_attribute(div, MEDIA_CHROME_ATTRIBUTES, "mediapaused  bogus mediavolume");
        assert_eq!(media_ui_attributes(&doc, div), vec!["mediapaused", "mediavolume"]);
        assert!(is_receiver(&doc, div));
        let plain = doc.create_element("span");
        assert!(!is_receiver(&doc, plain));
    }

    #[test]
    fn properties_win_over_attributes() {
        let doc = document();
        doc.define(
            "media-time-display",
            ElementDefinition::new()
                .observe(["mediacurrenttime"])
                .with_properties(["mediaCurrentTime"]),
        )
        .unwrap();
        let el = doc.create_element("media-time-display");
        doc.append_child(doc.id(), el).unwrap();
        propagate_to(&doc, el, StateKey::MediaCurrentTime, &StateValue::Number(4.0));
        assert_eq!(doc.property(el, "mediaCurrentTime"), Some(StateValue::Number(4.0)));
        assert!(!doc.has_attribute(el, "mediacurrenttime"));
    }

    #[test]
    fn disconnected_writes_wait_a_microtask() {
        let doc = document();
        let el = doc.create_element("div");
        doc.set_attribute(el, MEDIA_CHROME_ATTRIBUTES, "mediapaused");
        propagate_to(&doc, el, StateKey::MediaPaused, &StateValue::Bool(true));
        assert!(!doc.has_attribute(el, "mediapaused"));
        doc.tasks().run_until_idle();
        assert!(doc.has_attribute(el, "mediapaused"));
    }

    #[test]
    fn registration_replays_snapshot() {
        let doc = document();
        let receivers = Receivers::new(&doc);
        receivers.set_state(snapshot(&[
            (StateKey::MediaPaused, StateValue::Bool(true)),
            (StateKey::MediaVolume, StateValue::Number(0.5)),
        ]));
        let el = doc.create_element("div");
        doc.append_child(doc.id(), el).unwrap();
        doc.set_attribute(el, MEDIA_CHROME_ATTRIBUTES, "mediapaused mediavolume");
        receivers.register(el);
        receivers.register(el);
        assert_eq!(receivers.len(), 1);
        assert_eq!(doc.attribute(el, "mediavolume").as_deref(), Some("0.5"));
        assert!(doc.has_attribute(el, "mediapaused"));
    }

    #[test]
    fn discovery_skips_media_slot_and_defers_undefined() {
        let doc = document();
        doc.define("media-controller", ElementDefinition::new()).unwrap();
        let root = doc.create_element("media-controller");
        doc.append_child(doc.id(), root).unwrap();
        let video = doc.create_element("video");
        doc.set_attribute(video, "slot", MEDIA_SLOT);
        doc.set_attribute(video, MEDIA_CHROME_ATTRIBUTES, "mediapaused");
        let pending = doc.create_element("media-mute-button");
        doc.append_child(root, video).unwrap();
        doc.append_child(root, pending).unwrap();

        let receivers = Receivers::new(&doc);
        receivers.discover(root);
        assert!(receivers.is_empty());

        doc.define(
            "media-mute-button",
            ElementDefinition::new().observe(["mediamuted"]),
        )
        .unwrap();
        assert_eq!(receivers.pending_discoveries(), 1);
        doc.tasks().run_until_idle();
        assert_eq!(receivers.nodes(), vec![pending]);
    }

    #[test]
    fn monitor_tracks_registration_events_and_mutations() {
        let doc = document();
        doc.define("media-controller", ElementDefinition::new()).unwrap();
        let root = doc.create_element("media-controller");
        doc.append_child(doc.id(), root).unwrap();
        let receivers = Receivers::new(&doc);
        let monitor = Monitor::start(&doc, root, &receivers).unwrap();

        let el = doc.create_element("div");
        doc.set_attribute(el, MEDIA_CHROME_ATTRIBUTES, "mediapaused");
        doc.append_child(root, el).unwrap();
        doc.tasks().run_until_idle();
        assert!(receivers.contains(el));

        doc.remove_attribute(el, MEDIA_CHROME_ATTRIBUTES);
        doc.tasks().run_until_idle();
        assert!(!receivers.contains(el));

        let custom = doc.create_element("span");
        doc.append_child(root, custom).unwrap();
        doc.dispatch(&DomEvent::bubbling(REGISTER_RECEIVER, custom));
        assert!(receivers.contains(custom));
        doc.dispatch(&DomEvent::bubbling(UNREGISTER_RECEIVER, custom));
        assert!(!receivers.contains(custom));

        monitor.stop();
        assert_eq!(doc.listener_count(root), 0);
        assert_eq!(doc.observer_count(), 0);
    }
}
