//! Element handles into a [`Document`] arena.

use super::{Document, DomEvent, DomListener};
use crate::error::{Error, Result};
use crate::platform::{DocumentRoot, Element, EventTarget, Listener, MediaEvent, NodeId};
use crate::state::StateValue;
use std::rc::{Rc, Weak};

/// A cheap, clonable reference to an arena element. Handles do not keep the
/// document alive; once it is dropped every query returns a default.
#[derive(Clone)]
pub struct DomElement {
    document: Weak<Document>,
    id: NodeId,
}

impl DomElement {
    pub(crate) fn new(document: Weak<Document>, id: NodeId) -> Self {
        DomElement { document, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> Option<Rc<Document>> {
        self.document.upgrade()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.document()?.attribute(self.id, name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Some(doc) = self.document() {
            doc.set_attribute(self.id, name, value);
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Some(doc) = self.document() {
            doc.remove_attribute(self.id, name);
        }
    }

    pub fn property(&self, name: &str) -> Option<StateValue> {
        self.document()?.property(self.id, name)
    }

    pub fn add_listener(&self, kind: &str, listener: DomListener) {
        if let Some(doc) = self.document() {
            doc.add_listener(self.id, kind, listener);
        }
    }

    /// Dispatch a bubbling, composed event from this element.
    pub fn dispatch(&self, event: DomEvent) -> bool {
        match self.document() {
            Some(doc) => doc.dispatch(&event),
            None => true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.document().is_some_and(|d| d.is_connected(self.id))
    }

    pub fn as_element(&self) -> Rc<dyn Element> {
        Rc::new(self.clone())
    }
}

impl std::fmt::Debug for DomElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomElement")
            .field("id", &self.id)
            .field("local_name", &self.local_name())
            .finish()
    }
}

impl EventTarget for DomElement {
    fn add_event_listener(&self, kind: &str, listener: Listener) {
        if let Some(set) = self.document().and_then(|d| d.node_listeners(self.id)) {
            set.add(kind, listener);
        }
    }

    fn remove_event_listener(&self, kind: &str, listener: &Listener) {
        if let Some(set) = self.document().and_then(|d| d.node_listeners(self.id)) {
            set.remove(kind, listener);
        }
    }

    fn dispatch_event(&self, event: &MediaEvent) {
        if let Some(doc) = self.document() {
            doc.emit_on(self.id, event);
        }
    }
}

impl Element for DomElement {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn local_name(&self) -> String {
        self.document()
            .and_then(|d| d.local_name(self.id))
            .unwrap_or_default()
    }

    fn is_upgraded(&self) -> bool {
        self.document().is_some_and(|d| d.is_upgraded(self.id))
    }

    fn when_upgraded(&self, callback: Box<dyn FnOnce()>) {
        match self.document() {
            Some(doc) if !doc.is_upgraded(self.id) => {
                doc.when_defined(&self.local_name(), callback);
            }
            _ => callback(),
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.document().is_some_and(|d| d.has_attribute(self.id, name))
    }

    fn request_fullscreen(&self) -> Result<()> {
        let doc = self
            .document()
            .ok_or_else(|| Error::InvalidState("element is not in a document".into()))?;
        if !doc.is_connected(self.id) {
            return Err(Error::InvalidState("element is not connected".into()));
        }
        doc.enter_fullscreen(self.as_element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskQueue;
    use std::cell::Cell;

    #[test]
    fn fullscreen_requires_connection() {
        let doc = Document::new(TaskQueue::new());
        let id = doc.create_element("media-controller");
        let el = doc.element(id).unwrap();
        assert!(el.request_fullscreen().is_err());
        doc.append_child(doc.id(), id).unwrap();
        el.request_fullscreen().unwrap();
        assert_eq!(doc.fullscreen_element().map(|e| e.node_id()), Some(id));
    }

    #[test]
    fn upgrade_waits_for_definition() {
        let doc = Document::new(TaskQueue::new());
        let id = doc.create_element("media-player");
        let el = doc.element(id).unwrap();
        assert!(el.is_custom());
        let ran = std::rc::Rc::new(Cell::new(false));
        let r = ran.clone();
        el.when_upgraded(Box::new(move || r.set(true)));
        assert!(!ran.get());
        doc.define("media-player", super::super::ElementDefinition::new())
            .unwrap();
        assert!(ran.get());
        assert!(el.is_upgraded());
    }

    #[test]
    fn handles_outlive_their_document_quietly() {
        let doc = Document::new(TaskQueue::new());
        let el = doc.element(doc.create_element("div")).unwrap();
        drop(doc);
        assert_eq!(el.local_name(), "");
        assert!(!el.is_connected());
        assert!(el.dispatch(DomEvent::new("click", el.id())));
    }
}
