//! Media controller
//!
//! The element that owns a [`MediaStore`] inside a [`Document`]. It keeps a
//! registry of state receivers in sync with the store, re-dispatches
//! `<key>change` events on itself, forwards media requests bubbling out of
//! associated subtrees to the store, maps its own attributes onto store
//! options and turns key presses into requests. Pointer and keyboard
//! activity keeps `userinactive` off until `autohide` seconds pass.

use crate::dom::{
    Document, DomElement, DomEvent, DomListener, ElementDefinition, EventDetail, KeyPress,
    Lifecycle,
};
use crate::error::Result;
use crate::options::{MediaOptions, OptionsPatch};
use crate::platform::{Element, MediaElement, NodeId, Platform};
use crate::propagator::{Monitor, Receivers, MEDIA_SLOT};
use crate::requests::{Detail, Intent, RequestType};
use crate::state::{
    change_event_for_attribute, MediaState, StateKey, StateValue, USER_INACTIVE_ATTR,
};
use crate::store::{MediaStore, Subscription};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub const CONTROLLER_TAG: &str = "media-controller";

/// Seconds the arrow keys seek by when no offset attribute is set.
pub const DEFAULT_SEEK_OFFSET: f64 = 10.0;

/// Seconds of inactivity before `userinactive` is set.
pub const DEFAULT_AUTOHIDE: f64 = 2.0;

/// Events that count as user activity on the controller.
const ACTIVITY_EVENTS: &[&str] = &["pointermove", "pointerup", "mouseleave", "keyup"];

/// Keys that may trigger a shortcut on release.
pub const BUTTON_PRESSED_KEYS: &[&str] = &["ArrowLeft", "ArrowRight", "Enter", " ", "f", "m", "k", "c"];

/// Human readable hotkey bindings, as `(key, action)`.
pub const HOTKEY_BINDINGS: &[(&str, &str)] = &[
    ("Space / k", "toggle play and pause"),
    ("m", "toggle mute"),
    ("f", "toggle fullscreen"),
    ("c", "toggle captions"),
    ("ArrowLeft", "seek back (keyboardbackwardseekoffset, default 10s)"),
    ("ArrowRight", "seek forward (keyboardforwardseekoffset, default 10s)"),
];

/// Controller attribute names.
pub mod attributes {
    pub const AUTOHIDE: &str = "autohide";
    pub const AUTOHIDE_OVER_CONTROLS: &str = "autohideovercontrols";
    pub const DEFAULT_SUBTITLES: &str = "defaultsubtitles";
    pub const DEFAULT_STREAM_TYPE: &str = "defaultstreamtype";
    pub const DEFAULT_DURATION: &str = "defaultduration";
    pub const FULLSCREEN_ELEMENT: &str = "fullscreenelement";
    pub const HOTKEYS: &str = "hotkeys";
    pub const KEYS_USED: &str = "keysused";
    pub const LIVE_EDGE_OFFSET: &str = "liveedgeoffset";
    pub const SEEK_TO_LIVE_OFFSET: &str = "seektoliveoffset";
    pub const NO_AUTO_SEEK_TO_LIVE: &str = "noautoseektolive";
    pub const NO_HOTKEYS: &str = "nohotkeys";
    pub const NO_VOLUME_PREF: &str = "novolumepref";
    pub const NO_MUTED_PREF: &str = "nomutedpref";
    pub const NO_SUBTITLES_LANG_PREF: &str = "nosubtitleslangpref";
    pub const NO_DEFAULT_STORE: &str = "nodefaultstore";
    pub const KEYBOARD_FORWARD_SEEK_OFFSET: &str = "keyboardforwardseekoffset";
    pub const KEYBOARD_BACKWARD_SEEK_OFFSET: &str = "keyboardbackwardseekoffset";

    pub const OBSERVED: &[&str] = &[
        DEFAULT_SUBTITLES,
        DEFAULT_STREAM_TYPE,
        DEFAULT_DURATION,
        FULLSCREEN_ELEMENT,
        HOTKEYS,
        LIVE_EDGE_OFFSET,
        SEEK_TO_LIVE_OFFSET,
        NO_AUTO_SEEK_TO_LIVE,
        NO_HOTKEYS,
        NO_VOLUME_PREF,
        NO_MUTED_PREF,
        NO_SUBTITLES_LANG_PREF,
    ];
}

use attributes as attr;

struct Association {
    node: NodeId,
    monitor: Monitor,
    forward: DomListener,
}

pub struct MediaController {
    this: Weak<MediaController>,
    document: Rc<Document>,
    element: NodeId,
    platform: Rc<Platform>,
    store: RefCell<Option<MediaStore>>,
    subscription: RefCell<Option<Subscription>>,
    previous: RefCell<Option<MediaState>>,
    receivers: Rc<Receivers>,
    associations: RefCell<Vec<Association>>,
    media: RefCell<Option<Rc<dyn MediaElement>>>,
    fullscreen_target: RefCell<Option<Rc<dyn Element>>>,
    key_down: DomListener,
    key_up: DomListener,
    hotkeys_enabled: Cell<bool>,
    activity: DomListener,
    /// Bumped on every reschedule so stale autohide timers do nothing.
    inactive_timer: Cell<u64>,
}

impl MediaController {
    /// Create a detached `<media-controller>` with a shadow root holding a
    /// `media` slot and a default slot. The default store is built when the
    /// controller is first connected.
    pub fn new(document: &Rc<Document>, platform: Rc<Platform>) -> Result<Rc<Self>> {
        if !document.is_defined(CONTROLLER_TAG) {
            document.define(
                CONTROLLER_TAG,
                ElementDefinition::new().observe(attr::OBSERVED.iter().copied()),
            )?;
        }
        let element = document.create_element(CONTROLLER_TAG);
        let shadow = document.attach_shadow(element)?;
        let media_slot = document.create_element("slot");
        document.set_attribute(media_slot, "name", MEDIA_SLOT);
        document.append_child(shadow, media_slot)?;
        let default_slot = document.create_element("slot");
        document.append_child(shadow, default_slot)?;

        let controller = Rc::new_cyclic(|this: &Weak<MediaController>| {
            let down = this.clone();
            let up = this.clone();
            let active = this.clone();
            MediaController {
                this: this.clone(),
                document: document.clone(),
                element,
                platform,
                store: RefCell::new(None),
                subscription: RefCell::new(None),
                previous: RefCell::new(None),
                receivers: Receivers::new(document),
                associations: RefCell::new(Vec::new()),
                media: RefCell::new(None),
                fullscreen_target: RefCell::new(None),
                key_down: Rc::new(move |event: &DomEvent| {
                    if let Some(c) = down.upgrade() {
                        c.on_key_down(event);
                    }
                }),
                key_up: Rc::new(move |event: &DomEvent| {
                    if let Some(c) = up.upgrade() {
                        c.on_key_up(event);
                    }
                }),
                hotkeys_enabled: Cell::new(false),
                activity: Rc::new(move |event: &DomEvent| {
                    if let Some(c) = active.upgrade() {
                        c.on_activity(event);
                    }
                }),
                inactive_timer: Cell::new(0),
            }
        });

        let weak = Rc::downgrade(&controller);
        document.set_lifecycle_hook(
            element,
            Rc::new(move |event: &Lifecycle| {
                if let Some(c) = weak.upgrade() {
                    c.on_lifecycle(event);
                }
            }),
        );
        controller.associate_element(element)?;
        controller.enable_hotkeys();
        for kind in ACTIVITY_EVENTS {
            document.add_listener(element, kind, controller.activity.clone());
        }
        Ok(controller)
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn handle(&self) -> DomElement {
        DomElement::new(Rc::downgrade(&self.document), self.element)
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn platform(&self) -> &Rc<Platform> {
        &self.platform
    }

    pub fn receivers(&self) -> &Rc<Receivers> {
        &self.receivers
    }

    pub fn store(&self) -> Option<MediaStore> {
        self.store.borrow().clone()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.document.set_attribute(self.element, name, value);
    }

    pub fn remove_attribute(&self, name: &str) {
        self.document.remove_attribute(self.element, name);
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.document.has_attribute(self.element, name)
    }

    fn numeric_attribute(&self, name: &str) -> Option<f64> {
        let raw = self.document.attribute(self.element, name)?;
        match raw.trim().parse::<f64>() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("ignoring non-numeric {name}={raw:?}");
                None
            }
        }
    }

    /// Replace the store. Without a store and without `nodefaultstore` a
    /// default store is built from the controller attributes.
    pub fn set_store(&self, store: Option<MediaStore>) {
        let previous = self.subscription.borrow_mut().take();
        if let Some(subscription) = previous {
            subscription.unsubscribe();
        }
        *self.store.borrow_mut() = store.clone();
        match store {
            None if !self.has_attribute(attr::NO_DEFAULT_STORE) => self.setup_default_store(),
            None => {}
            Some(store) => self.subscribe(&store),
        }
    }

    fn subscribe(&self, store: &MediaStore) {
        let weak = self.this.clone();
        let subscription = store.subscribe(move |state: &MediaState| {
            if let Some(c) = weak.upgrade() {
                c.on_state(state);
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    /// Options as the controller attributes describe them.
    pub fn options_from_attributes(&self) -> MediaOptions {
        let live_edge_offset = self.numeric_attribute(attr::LIVE_EDGE_OFFSET);
        MediaOptions {
            default_subtitles: self.has_attribute(attr::DEFAULT_SUBTITLES),
            default_stream_type: self.document.attribute(self.element, attr::DEFAULT_STREAM_TYPE),
            default_duration: self.numeric_attribute(attr::DEFAULT_DURATION),
            live_edge_offset,
            seek_to_live_offset: self
                .numeric_attribute(attr::SEEK_TO_LIVE_OFFSET)
                .or(live_edge_offset),
            no_auto_seek_to_live: self.has_attribute(attr::NO_AUTO_SEEK_TO_LIVE),
            no_volume_pref: self.has_attribute(attr::NO_VOLUME_PREF),
            no_muted_pref: self.has_attribute(attr::NO_MUTED_PREF),
            no_subtitles_lang_pref: self.has_attribute(attr::NO_SUBTITLES_LANG_PREF),
            ..MediaOptions::default()
        }
    }

    fn setup_default_store(&self) {
        let mut builder = MediaStore::builder()
            .platform(self.platform.clone())
            .options(self.options_from_attributes())
            .fullscreen_element(self.fullscreen_element());
        if let Some(media) = self.media() {
            builder = builder.media(media);
        }
        log::debug!("building default store for controller {}", self.element.raw());
        self.set_store(Some(builder.build()));
    }

    fn dispatch(&self, intent: Intent) {
        if let Some(store) = self.store() {
            store.dispatch(intent);
        }
    }

    // ---- state owners ----

    pub fn media(&self) -> Option<Rc<dyn MediaElement>> {
        self.media.borrow().clone()
    }

    /// Place `media` in the controller's media slot (replacing any previous
    /// media) and hand it to the store.
    pub fn set_media(&self, media: Option<Rc<dyn MediaElement>>) -> Result<()> {
        let previous = self.media.borrow_mut().take();
        if let Some(previous) = &previous {
            self.document.remove(previous.node_id());
        }
        if let Some(media) = &media {
            let element = media.clone().as_element();
            self.document.adopt(self.element, &element)?;
            self.document.set_attribute(element.node_id(), "slot", MEDIA_SLOT);
        }
        *self.media.borrow_mut() = media.clone();
        if previous.is_none() && media.is_none() {
            return Ok(());
        }
        self.dispatch(Intent::media_change(media));
        Ok(())
    }

    /// The fullscreen target; the controller itself unless overridden.
    pub fn fullscreen_element(&self) -> Rc<dyn Element> {
        self.fullscreen_target
            .borrow()
            .clone()
            .unwrap_or_else(|| self.handle().as_element())
    }

    pub fn set_fullscreen_element(&self, element: Option<Rc<dyn Element>>) {
        if self.has_attribute(attr::FULLSCREEN_ELEMENT) {
            self.remove_attribute(attr::FULLSCREEN_ELEMENT);
        }
        *self.fullscreen_target.borrow_mut() = element;
        self.dispatch(Intent::fullscreen_element_change(Some(self.fullscreen_element())));
    }

    // ---- receivers ----

    pub fn register_receiver(&self, node: NodeId) {
        self.receivers.register(node);
    }

    pub fn unregister_receiver(&self, node: NodeId) {
        self.receivers.unregister(node);
    }

    /// Watch `node`'s subtree for receivers and forward media requests that
    /// bubble out of it to the store.
    pub fn associate_element(&self, node: NodeId) -> Result<()> {
        if self.associations.borrow().iter().any(|a| a.node == node) {
            return Ok(());
        }
        let monitor = Monitor::start(&self.document, node, &self.receivers)?;
        let weak = self.this.clone();
        let forward: DomListener = Rc::new(move |event: &DomEvent| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            let detail = match &event.detail {
                EventDetail::Request(detail) => detail.clone(),
                _ => Detail::None,
            };
            controller.dispatch(Intent {
                kind: event.kind.clone(),
                detail,
            });
        });
        for request in media_ui_requests() {
            self.document.add_listener(node, request.name(), forward.clone());
        }
        self.associations.borrow_mut().push(Association {
            node,
            monitor,
            forward,
        });
        Ok(())
    }

    pub fn unassociate_element(&self, node: NodeId) {
        let association = {
            let mut associations = self.associations.borrow_mut();
            associations
                .iter()
                .position(|a| a.node == node)
                .map(|i| associations.remove(i))
        };
        if let Some(association) = association {
            self.release(association);
        }
    }

    fn release(&self, association: Association) {
        for request in media_ui_requests() {
            self.document
                .remove_listener(association.node, request.name(), &association.forward);
        }
        association.monitor.stop();
    }

    pub fn associated_elements(&self) -> Vec<NodeId> {
        self.associations.borrow().iter().map(|a| a.node).collect()
    }

    fn on_state(&self, state: &MediaState) {
        self.receivers.set_state(state.clone());
        let previous = self.previous.replace(Some(state.clone()));
        for (key, value) in state.iter() {
            let unchanged = previous
                .as_ref()
                .is_some_and(|p| p.contains(*key) && p.get(*key) == value);
            if unchanged {
                continue;
            }
            self.receivers.propagate(*key, value);
            let event = DomEvent::composed(&key.change_event(), self.element)
                .with_detail(EventDetail::State(value.clone()));
            self.document.dispatch(&event);
        }
    }

    // ---- lifecycle ----

    fn on_lifecycle(&self, event: &Lifecycle) {
        match event {
            Lifecycle::Connected => self.connected(),
            Lifecycle::Disconnected => self.disconnected(),
            Lifecycle::AttributeChanged { name, old, new } => {
                self.attribute_changed(name, old.as_deref(), new.as_deref())
            }
        }
    }

    fn connected(&self) {
        if self.store().is_none() && !self.has_attribute(attr::NO_DEFAULT_STORE) {
            self.setup_default_store();
        }
        self.dispatch(Intent::document_change(self.document.as_root()));
        if let Some(store) = self.store() {
            if self.subscription.borrow().is_none() {
                self.subscribe(&store);
            }
        }
        self.enable_hotkeys();
        self.set_attribute(USER_INACTIVE_ATTR, "");
    }

    fn disconnected(&self) {
        self.cancel_inactive();
        if self.store().is_some() {
            self.dispatch(Intent::document_change(None));
            self.dispatch(Intent::request_with(RequestType::ToggleSubtitles, false));
        }
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        let changed = old != new;
        let patch = match name {
            attr::NO_HOTKEYS => {
                if changed && new == Some("") {
                    if self.has_attribute(attr::HOTKEYS) {
                        log::warn!("both hotkeys and nohotkeys are set, all hotkeys are disabled");
                    }
                    self.disable_hotkeys();
                } else if changed && new.is_none() {
                    self.enable_hotkeys();
                }
                None
            }
            attr::DEFAULT_SUBTITLES if changed => Some(
                OptionsPatch::new().with("defaultSubtitles", self.has_attribute(attr::DEFAULT_SUBTITLES)),
            ),
            attr::DEFAULT_STREAM_TYPE => {
                Some(OptionsPatch::new().with_opt("defaultStreamType", new.map(str::to_string)))
            }
            attr::DEFAULT_DURATION => Some(
                OptionsPatch::new().with_opt("defaultDuration", self.numeric_attribute(attr::DEFAULT_DURATION)),
            ),
            attr::LIVE_EDGE_OFFSET => {
                let offset = self.numeric_attribute(attr::LIVE_EDGE_OFFSET);
                let patch = OptionsPatch::new().with_opt("liveEdgeOffset", offset);
                if self.has_attribute(attr::SEEK_TO_LIVE_OFFSET) {
                    Some(patch)
                } else {
                    Some(patch.with_opt("seekToLiveOffset", offset))
                }
            }
            attr::SEEK_TO_LIVE_OFFSET => Some(OptionsPatch::new().with_opt(
                "seekToLiveOffset",
                self.numeric_attribute(attr::SEEK_TO_LIVE_OFFSET)
                    .or_else(|| self.numeric_attribute(attr::LIVE_EDGE_OFFSET)),
            )),
            attr::NO_AUTO_SEEK_TO_LIVE => Some(
                OptionsPatch::new().with("noAutoSeekToLive", self.has_attribute(attr::NO_AUTO_SEEK_TO_LIVE)),
            ),
            attr::NO_VOLUME_PREF => Some(
                OptionsPatch::new().with("noVolumePref", self.has_attribute(attr::NO_VOLUME_PREF)),
            ),
            attr::NO_MUTED_PREF => Some(
                OptionsPatch::new().with("noMutedPref", self.has_attribute(attr::NO_MUTED_PREF)),
            ),
            attr::NO_SUBTITLES_LANG_PREF => Some(OptionsPatch::new().with(
                "noSubtitlesLangPref",
                self.has_attribute(attr::NO_SUBTITLES_LANG_PREF),
            )),
            attr::FULLSCREEN_ELEMENT => {
                let target = new
                    .filter(|id| !id.is_empty())
                    .and_then(|id| self.document.get_element_by_id(id))
                    .and_then(|node| self.document.element_handle(node));
                *self.fullscreen_target.borrow_mut() = target;
                self.dispatch(Intent::fullscreen_element_change(Some(self.fullscreen_element())));
                None
            }
            _ => None,
        };
        if let Some(patch) = patch {
            self.dispatch(Intent::options_change(patch));
        }
    }

    // ---- autohide ----

    /// Seconds of inactivity before the controls hide. Negative disables
    /// autohide. A value that is not a number counts as zero.
    pub fn autohide(&self) -> f64 {
        match self.document.attribute(self.element, attr::AUTOHIDE) {
            Some(raw) => raw.trim().parse::<f64>().unwrap_or(0.0),
            None => DEFAULT_AUTOHIDE,
        }
    }

    pub fn user_inactive(&self) -> bool {
        self.has_attribute(USER_INACTIVE_ATTR)
    }

    fn on_activity(&self, event: &DomEvent) {
        match event.kind.as_str() {
            "mouseleave" => self.set_inactive(),
            "pointermove" => {
                let over_media = self.media().is_some_and(|m| m.node_id() == event.target);
                if event.target == self.element
                    || over_media
                    || self.has_attribute(attr::AUTOHIDE_OVER_CONTROLS)
                {
                    self.schedule_inactive();
                } else {
                    // Hovering a control keeps the controls up.
                    self.cancel_inactive();
                }
            }
            _ => self.schedule_inactive(),
        }
    }

    fn cancel_inactive(&self) {
        self.inactive_timer.set(self.inactive_timer.get() + 1);
    }

    /// Show the controls now and hide them again after `autohide` seconds.
    fn schedule_inactive(&self) {
        self.set_active();
        self.cancel_inactive();
        let autohide = self.autohide().trunc();
        if autohide < 0.0 {
            return;
        }
        let generation = self.inactive_timer.get();
        let weak = self.this.clone();
        self.document
            .tasks()
            .queue_timeout((autohide * 1000.0) as u64, move || {
                let Some(controller) = weak.upgrade() else {
                    return;
                };
                if controller.inactive_timer.get() == generation {
                    controller.set_inactive();
                }
            });
    }

    fn set_inactive(&self) {
        if self.autohide() < 0.0 || self.user_inactive() {
            return;
        }
        self.set_attribute(USER_INACTIVE_ATTR, "");
        self.dispatch_user_inactive(true);
    }

    fn set_active(&self) {
        if !self.user_inactive() {
            return;
        }
        self.remove_attribute(USER_INACTIVE_ATTR);
        self.dispatch_user_inactive(false);
    }

    fn dispatch_user_inactive(&self, inactive: bool) {
        log::trace!("userinactive={inactive}");
        let event = DomEvent::bubbling(&change_event_for_attribute(USER_INACTIVE_ATTR), self.element)
            .with_detail(EventDetail::State(StateValue::Bool(inactive)));
        self.document.dispatch(&event);
    }

    // ---- hotkeys ----

    pub fn enable_hotkeys(&self) {
        self.document
            .add_listener(self.element, "keydown", self.key_down.clone());
        self.hotkeys_enabled.set(true);
    }

    pub fn disable_hotkeys(&self) {
        self.document
            .remove_listener(self.element, "keydown", &self.key_down);
        self.document.remove_listener(self.element, "keyup", &self.key_up);
        self.hotkeys_enabled.set(false);
    }

    pub fn hotkeys_enabled(&self) -> bool {
        self.hotkeys_enabled.get()
    }

    /// True when the `hotkeys` attribute opts out of `key`.
    fn hotkey_blocked(&self, key: &str) -> bool {
        let tokens = self
            .document
            .attribute(self.element, attr::HOTKEYS)
            .unwrap_or_default();
        let tokens: Vec<&str> = tokens.split_whitespace().collect();
        tokens.contains(&format!("no{}", key.to_lowercase()).as_str())
            || (key == " " && tokens.contains(&"nospace"))
    }

    fn on_key_down(&self, event: &DomEvent) {
        let EventDetail::Key(press) = &event.detail else {
            return;
        };
        if press.meta || press.alt || !BUTTON_PRESSED_KEYS.contains(&press.key.as_str()) {
            self.document.remove_listener(self.element, "keyup", &self.key_up);
            return;
        }
        if [" ", "ArrowLeft", "ArrowRight"].contains(&press.key.as_str()) && !self.hotkey_blocked(&press.key)
        {
            event.prevent_default();
        }
        self.document
            .add_listener(self.element, "keyup", self.key_up.clone());
    }

    fn on_key_up(&self, event: &DomEvent) {
        self.document.remove_listener(self.element, "keyup", &self.key_up);
        let EventDetail::Key(press) = &event.detail else {
            return;
        };
        if BUTTON_PRESSED_KEYS.contains(&press.key.as_str()) {
            self.keyboard_shortcut(event.target, press);
        }
    }

    /// Turn a released key into a media request, unless the focused
    /// `target` claims the key through `keysused` or `hotkeys` opts out.
    pub fn keyboard_shortcut(&self, target: NodeId, press: &KeyPress) {
        let keys_used = self
            .document
            .attribute(target, attr::KEYS_USED)
            .unwrap_or_default();
        let claimed = keys_used
            .split(' ')
            .filter(|k| !k.is_empty())
            .map(|k| if k == "Space" { " " } else { k })
            .any(|k| k == press.key);
        if claimed || self.hotkey_blocked(&press.key) {
            return;
        }
        let Some(store) = self.store() else {
            return;
        };
        let state = store.get_state();
        let (request, detail) = match press.key.as_str() {
            " " | "k" if state.paused() => (RequestType::Play, Detail::None),
            " " | "k" => (RequestType::Pause, Detail::None),
            "m" if state.get(StateKey::MediaVolumeLevel).as_text() == Some("off") => {
                (RequestType::Unmute, Detail::None)
            }
            "m" => (RequestType::Mute, Detail::None),
            "f" if state.is_fullscreen() => (RequestType::ExitFullscreen, Detail::None),
            "f" => (RequestType::EnterFullscreen, Detail::None),
            "c" => (RequestType::ToggleSubtitles, Detail::None),
            "ArrowLeft" => {
                let offset = self
                    .numeric_attribute(attr::KEYBOARD_BACKWARD_SEEK_OFFSET)
                    .unwrap_or(DEFAULT_SEEK_OFFSET);
                let time = (state.current_time() - offset).max(0.0);
                (RequestType::Seek, Detail::Number(time))
            }
            "ArrowRight" => {
                let offset = self
                    .numeric_attribute(attr::KEYBOARD_FORWARD_SEEK_OFFSET)
                    .unwrap_or(DEFAULT_SEEK_OFFSET);
                let time = (state.current_time() + offset).max(0.0);
                (RequestType::Seek, Detail::Number(time))
            }
            _ => return,
        };
        log::debug!("hotkey {:?} -> {}", press.key, request);
        let event = DomEvent::bubbling(request.name(), self.element)
            .with_detail(EventDetail::Request(detail));
        self.document.dispatch(&event);
    }
}

impl Drop for MediaController {
    fn drop(&mut self) {
        self.document.clear_lifecycle_hook(self.element);
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
        for association in std::mem::take(self.associations.get_mut()) {
            self.release(association);
        }
        self.disable_hotkeys();
        for kind in ACTIVITY_EVENTS {
            self.document.remove_listener(self.element, kind, &self.activity);
        }
    }
}

impl std::fmt::Debug for MediaController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaController")
            .field("element", &self.element)
            .field("receivers", &self.receivers.len())
            .field("associations", &self.associations.borrow().len())
            .field("hotkeys", &self.hotkeys_enabled.get())
            .field("user_inactive", &self.user_inactive())
            .finish()
    }
}

/// Request types a control may dispatch through the DOM.
fn media_ui_requests() -> impl Iterator<Item = RequestType> {
    RequestType::ALL
        .iter()
        .copied()
        .filter(|r| !r.is_reassignment())
}

/// Dispatch a full key press (`keydown` then `keyup`) from `target`.
pub fn press_key(document: &Document, target: NodeId, press: KeyPress) -> bool {
    let down = DomEvent::bubbling("keydown", target).with_detail(EventDetail::Key(press.clone()));
    let not_prevented = document.dispatch(&down);
    let up = DomEvent::bubbling("keyup", target).with_detail(EventDetail::Key(press));
    document.dispatch(&up);
    not_prevented
}
