//! The collection of objects the store reads state from and writes
//! intents to.

use crate::options::MediaOptions;
use crate::platform::{
    same_rc, Capabilities, DocumentRoot, Element, MediaElement, NodeId, Platform,
};
use std::ops::Deref;
use std::rc::Rc;

/// An assigned media element and the capabilities probed when it was
/// assigned.
#[derive(Clone)]
pub struct MediaHandle {
    element: Rc<dyn MediaElement>,
    capabilities: Capabilities,
}

impl MediaHandle {
    pub fn new(element: Rc<dyn MediaElement>) -> Self {
        let capabilities = element.capabilities();
        MediaHandle {
            element,
            capabilities,
        }
    }

    pub fn element(&self) -> &Rc<dyn MediaElement> {
        &self.element
    }

    pub fn as_element(&self) -> Rc<dyn Element> {
        self.element.clone().as_element()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is(&self, other: &Rc<dyn MediaElement>) -> bool {
        same_rc(&self.element, other)
    }
}

impl Deref for MediaHandle {
    type Target = dyn MediaElement;

    fn deref(&self) -> &Self::Target {
        &*self.element
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("node", &self.element.node_id())
            .field("local_name", &self.element.local_name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// State owners held by a store. Every field may be absent.
#[derive(Clone)]
pub struct StateOwners {
    pub media: Option<MediaHandle>,
    pub document: Option<Rc<dyn DocumentRoot>>,
    /// Element to take fullscreen; the media itself when absent.
    pub fullscreen_element: Option<Rc<dyn Element>>,
    pub options: MediaOptions,
    pub platform: Rc<Platform>,
}

impl StateOwners {
    pub fn new(platform: Rc<Platform>) -> Self {
        StateOwners {
            media: None,
            document: None,
            fullscreen_element: None,
            options: MediaOptions::default(),
            platform,
        }
    }

    pub fn media_id(&self) -> Option<NodeId> {
        self.media.as_ref().map(|m| m.node_id())
    }

    /// Node that should end up fullscreen.
    pub fn fullscreen_target_id(&self) -> Option<NodeId> {
        self.fullscreen_element
            .as_ref()
            .map(|el| el.node_id())
            .or_else(|| self.media_id())
    }
}

impl std::fmt::Debug for StateOwners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateOwners")
            .field("media", &self.media)
            .field("document", &self.document.as_ref().map(|d| d.node_id()))
            .field(
                "fullscreen_element",
                &self.fullscreen_element.as_ref().map(|e| e.node_id()),
            )
            .field("options", &self.options)
            .finish()
    }
}

/// A pending reassignment. `Some(None)` clears an owner, `None` leaves it
/// untouched.
#[derive(Clone, Default)]
pub struct OwnersPatch {
    pub media: Option<Option<Rc<dyn MediaElement>>>,
    pub document: Option<Option<Rc<dyn DocumentRoot>>>,
    pub fullscreen_element: Option<Option<Rc<dyn Element>>>,
}

impl OwnersPatch {
    pub fn is_empty(&self) -> bool {
        self.media.is_none() && self.document.is_none() && self.fullscreen_element.is_none()
    }

    /// Fold a later patch into this one; later assignments win.
    pub fn merge(&mut self, later: OwnersPatch) {
        if later.media.is_some() {
            self.media = later.media;
        }
        if later.document.is_some() {
            self.document = later.document;
        }
        if later.fullscreen_element.is_some() {
            self.fullscreen_element = later.fullscreen_element;
        }
    }

    /// Elements that must be upgraded before the patch can be applied.
    pub fn pending_upgrades(&self) -> Vec<Rc<dyn Element>> {
        let mut out = Vec::new();
        if let Some(Some(media)) = &self.media {
            if !media.is_upgraded() {
                out.push(media.clone().as_element());
            }
        }
        if let Some(Some(el)) = &self.fullscreen_element {
            if !el.is_upgraded() {
                out.push(el.clone());
            }
        }
        out
    }

    pub fn apply(self, owners: &mut StateOwners) {
        if let Some(media) = self.media {
            owners.media = match (media, owners.media.take()) {
                (Some(next), Some(current)) if current.is(&next) => Some(current),
                (Some(next), _) => Some(MediaHandle::new(next)),
                (None, _) => None,
            };
        }
        if let Some(document) = self.document {
            owners.document = document;
        }
        if let Some(el) = self.fullscreen_element {
            owners.fullscreen_element = el;
        }
    }
}

impl std::fmt::Debug for OwnersPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = |present: bool| if present { "set" } else { "clear" };
        f.debug_struct("OwnersPatch")
            .field("media", &self.media.as_ref().map(|m| id(m.is_some())))
            .field("document", &self.document.as_ref().map(|d| id(d.is_some())))
            .field(
                "fullscreen_element",
                &self.fullscreen_element.as_ref().map(|e| id(e.is_some())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;

    #[test]
    fn later_patch_wins() {
        let a: Rc<dyn MediaElement> = HeadlessMedia::new();
        let b: Rc<dyn MediaElement> = HeadlessMedia::new();
        let mut patch = OwnersPatch {
            media: Some(Some(a)),
            ..Default::default()
        };
        patch.merge(OwnersPatch {
            media: Some(Some(b.clone())),
            ..Default::default()
        });
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        patch.apply(&mut owners);
        assert_eq!(owners.media_id(), Some(b.node_id()));
    }

    #[test]
    fn reassigning_same_media_keeps_handle() {
        let media: Rc<dyn MediaElement> = HeadlessMedia::new();
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        OwnersPatch {
            media: Some(Some(media.clone())),
            ..Default::default()
        }
        .apply(&mut owners);
        let caps = owners.media.as_ref().map(|m| m.capabilities());
        OwnersPatch {
            media: Some(Some(media)),
            ..Default::default()
        }
        .apply(&mut owners);
        assert_eq!(owners.media.as_ref().map(|m| m.capabilities()), caps);
        assert!(caps.is_some_and(|c| c.volume));
    }

    #[test]
    fn fullscreen_target_defaults_to_media() {
        let media: Rc<dyn MediaElement> = HeadlessMedia::new();
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        assert_eq!(owners.fullscreen_target_id(), None);
        owners.media = Some(MediaHandle::new(media.clone()));
        assert_eq!(owners.fullscreen_target_id(), Some(media.node_id()));
    }
}
