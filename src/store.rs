//! The media store
//!
//! Owns the state owners and the current [`MediaState`] snapshot. Native
//! events from the owners recompute single keys, intents go through the
//! [`RequestMap`], and owner reassignments are coalesced into one pass on
//! the next microtask.
//!
//! A store starts out idle: listeners are only wired and update handlers
//! only run while it is monitoring, which by default means while it has at
//! least one subscriber.

use crate::mediator::{EventSource, Facade, FacadeProperty, Teardown, UpdateHandler};
use crate::options::{MediaOptions, OptionsPatch};
use crate::owners::{OwnersPatch, StateOwners};
use crate::platform::{
    same_rc, AudioTrackList, DocumentRoot, Element, Listener, MediaElement, MediaEvent, NodeId,
    Platform, RemotePlayback, RenditionList, TextTrackList,
};
use crate::requests::{Detail, Intent, RequestMap, RequestType};
use crate::state::{MediaState, PartialState, StateKey, StateValue};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

type Callback = Rc<dyn Fn(&MediaState)>;

/// An object listeners are currently attached to.
#[derive(Clone)]
enum Wired {
    Media(Rc<dyn MediaElement>),
    TextTracks(Rc<dyn TextTrackList>),
    VideoRenditions(Rc<dyn RenditionList>),
    AudioTracks(Rc<dyn AudioTrackList>),
    Remote(Rc<dyn RemotePlayback>),
    Root(Rc<dyn DocumentRoot>),
}

impl Wired {
    fn resolve(source: EventSource, owners: &StateOwners) -> Option<Wired> {
        let media = owners.media.as_ref();
        match source {
            EventSource::Media => media.map(|m| Wired::Media(m.element().clone())),
            EventSource::TextTracks => media.and_then(|m| m.text_tracks()).map(Wired::TextTracks),
            EventSource::VideoRenditions => media
                .and_then(|m| m.video_renditions())
                .map(Wired::VideoRenditions),
            EventSource::AudioTracks => media.and_then(|m| m.audio_tracks()).map(Wired::AudioTracks),
            EventSource::Remote => media.and_then(|m| m.remote()).map(Wired::Remote),
            EventSource::Root => owners.document.clone().map(Wired::Root),
        }
    }

    fn same(&self, other: &Wired) -> bool {
        match (self, other) {
            (Wired::Media(a), Wired::Media(b)) => a.node_id() == b.node_id(),
            (Wired::TextTracks(a), Wired::TextTracks(b)) => same_rc(a, b),
            (Wired::VideoRenditions(a), Wired::VideoRenditions(b)) => same_rc(a, b),
            (Wired::AudioTracks(a), Wired::AudioTracks(b)) => same_rc(a, b),
            (Wired::Remote(a), Wired::Remote(b)) => same_rc(a, b),
            (Wired::Root(a), Wired::Root(b)) => a.node_id() == b.node_id(),
            _ => false,
        }
    }

    fn add(&self, kind: &str, listener: Listener) {
        match self {
            Wired::Media(t) => t.add_event_listener(kind, listener),
            Wired::TextTracks(t) => t.add_event_listener(kind, listener),
            Wired::VideoRenditions(t) => t.add_event_listener(kind, listener),
            Wired::AudioTracks(t) => t.add_event_listener(kind, listener),
            Wired::Remote(t) => t.add_event_listener(kind, listener),
            Wired::Root(t) => t.add_event_listener(kind, listener),
        }
    }

    fn remove(&self, kind: &str, listener: &Listener) {
        match self {
            Wired::Media(t) => t.remove_event_listener(kind, listener),
            Wired::TextTracks(t) => t.remove_event_listener(kind, listener),
            Wired::VideoRenditions(t) => t.remove_event_listener(kind, listener),
            Wired::AudioTracks(t) => t.remove_event_listener(kind, listener),
            Wired::Remote(t) => t.remove_event_listener(kind, listener),
            Wired::Root(t) => t.remove_event_listener(kind, listener),
        }
    }
}

/// What the update handlers were last run against. Handlers are torn down
/// and run again whenever this changes. Options are tracked separately in
/// [`Wiring::options`] and only re-run the option handlers.
#[derive(Debug, Clone, PartialEq)]
struct HandlerScope {
    media: Option<NodeId>,
    document: Option<NodeId>,
    fullscreen_element: Option<NodeId>,
    monitoring: bool,
}

impl HandlerScope {
    fn of(owners: &StateOwners, monitoring: bool) -> Self {
        HandlerScope {
            media: owners.media_id(),
            document: owners.document.as_ref().map(|d| d.node_id()),
            fullscreen_element: owners.fullscreen_element.as_ref().map(|e| e.node_id()),
            monitoring,
        }
    }
}

#[derive(Default)]
struct Wiring {
    targets: BTreeMap<EventSource, Wired>,
    scope: Option<HandlerScope>,
    options: Option<MediaOptions>,
    teardowns: Vec<Teardown>,
    option_teardowns: Vec<Teardown>,
}

struct StoreInner {
    this: Weak<StoreInner>,
    facade: Facade,
    requests: RequestMap,
    platform: Rc<Platform>,
    monitor_only_with_subscriptions: bool,
    /// One listener per facade key, reused for every event source so it can
    /// be removed by identity.
    listeners: Vec<(StateKey, Listener)>,
    owners: RefCell<StateOwners>,
    state: RefCell<MediaState>,
    subscribers: RefCell<Vec<(u64, Callback)>>,
    next_subscriber: Cell<u64>,
    subscriber_count: Cell<usize>,
    wiring: RefCell<Wiring>,
    pending: RefCell<Option<OwnersPatch>>,
    flush_scheduled: Cell<bool>,
}

impl StoreInner {
    fn monitoring(&self) -> bool {
        !self.monitor_only_with_subscriptions || self.subscriber_count.get() > 0
    }

    fn listener(&self, key: StateKey) -> Option<&Listener> {
        self.listeners.iter().find(|(k, _)| *k == key).map(|(_, l)| l)
    }

    fn on_event(&self, key: StateKey, event: &MediaEvent) {
        let Some(property) = self.facade.property(key) else {
            return;
        };
        let get = property.get;
        let owners = self.owners.borrow().clone();
        let mut partial = PartialState::new();
        partial.insert(key, get(&owners, Some(event)));
        self.update_state(partial);
    }

    /// Merge `partial` into the snapshot and broadcast, unless nothing changed.
    fn update_state(&self, partial: PartialState) {
        if !self.state.borrow().differs(&partial) {
            return;
        }
        let next = self.state.borrow().merged(&partial);
        *self.state.borrow_mut() = next.clone();
        log::trace!(
            "state changed: {}",
            partial
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let subscribers: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in subscribers {
            callback(&next);
        }
    }

    /// Detach listeners from targets that are no longer valid and attach to
    /// new ones. Targets that did not change are left alone.
    fn rewire(&self, owners: &StateOwners, monitoring: bool) {
        for source in EventSource::ALL {
            let next = if monitoring {
                Wired::resolve(source, owners)
            } else {
                None
            };
            let prev = self.wiring.borrow().targets.get(&source).cloned();
            let unchanged = match (&prev, &next) {
                (Some(a), Some(b)) => a.same(b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                continue;
            }
            for property in self.facade.properties() {
                let events = property.events(source);
                if events.is_empty() {
                    continue;
                }
                let Some(listener) = self.listener(property.key) else {
                    continue;
                };
                for kind in events {
                    if let Some(prev) = &prev {
                        prev.remove(kind, listener);
                    }
                    if let Some(next) = &next {
                        next.add(kind, listener.clone());
                    }
                }
            }
            let mut wiring = self.wiring.borrow_mut();
            match next {
                Some(next) => wiring.targets.insert(source, next),
                None => wiring.targets.remove(&source),
            };
        }
    }

    /// One update pass: apply a reassignment, rewire listeners, recompute
    /// every facade key, then (re)run update handlers if their scope changed.
    fn run_pass(&self, patch: OwnersPatch, options: Option<&OptionsPatch>) {
        let mut next = self.owners.borrow().clone();
        patch.apply(&mut next);
        if let Some(options) = options {
            next.options.apply_patch(options);
        }

        let monitoring = self.monitoring();
        let scope = HandlerScope::of(&next, monitoring);
        let rescope = self.wiring.borrow().scope.as_ref() != Some(&scope);
        let reoption = rescope || self.wiring.borrow().options.as_ref() != Some(&next.options);
        if rescope {
            let teardowns = std::mem::take(&mut self.wiring.borrow_mut().teardowns);
            for teardown in teardowns {
                teardown();
            }
        }
        if reoption {
            let teardowns = std::mem::take(&mut self.wiring.borrow_mut().option_teardowns);
            for teardown in teardowns {
                teardown();
            }
        }

        self.rewire(&next, monitoring);
        *self.owners.borrow_mut() = next.clone();
        log::debug!(
            "store pass: media={:?} document={:?} monitoring={monitoring}",
            scope.media,
            scope.document
        );

        self.update_state(self.facade.evaluate(&next));

        if rescope {
            self.wiring.borrow_mut().scope = Some(scope);
            if monitoring {
                let teardowns = self.run_handlers(&next, |p| p.update_handlers);
                self.wiring.borrow_mut().teardowns.extend(teardowns);
            }
        }
        if reoption {
            self.wiring.borrow_mut().options = Some(next.options.clone());
            if monitoring {
                let teardowns = self.run_handlers(&next, |p| p.option_handlers);
                self.wiring.borrow_mut().option_teardowns.extend(teardowns);
            }
        }
    }

    fn run_handlers(
        &self,
        owners: &StateOwners,
        select: fn(&FacadeProperty) -> &'static [UpdateHandler],
    ) -> Vec<Teardown> {
        let mut teardowns = Vec::new();
        for property in self.facade.properties() {
            let Some(push) = self.listener(property.key) else {
                continue;
            };
            for handler in select(property) {
                teardowns.extend(handler(push, owners));
            }
        }
        teardowns
    }

    fn reassign(&self, patch: OwnersPatch) {
        {
            let mut pending = self.pending.borrow_mut();
            match pending.as_mut() {
                Some(existing) => existing.merge(patch),
                None => *pending = Some(patch),
            }
        }
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        if self.flush_scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        self.platform.tasks().queue(move || {
            if let Some(inner) = this.upgrade() {
                inner.flush_pending();
            }
        });
    }

    /// Apply the coalesced reassignment once every element it assigns has
    /// been upgraded.
    fn flush_pending(&self) {
        self.flush_scheduled.set(false);
        let waiting_on = self
            .pending
            .borrow()
            .as_ref()
            .and_then(|p| p.pending_upgrades().into_iter().next());
        if let Some(element) = waiting_on {
            log::debug!(
                "waiting for <{}> to be upgraded before assigning it",
                element.local_name()
            );
            let this = self.this.clone();
            element.when_upgraded(Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.schedule_flush();
                }
            }));
            return;
        }
        let patch = self.pending.borrow_mut().take();
        if let Some(patch) = patch {
            self.run_pass(patch, None);
        }
    }

    fn dispatch(&self, intent: &Intent) {
        let Some(request) = intent.request_type() else {
            log::trace!("ignoring unknown intent {}", intent.kind);
            return;
        };
        match (request, &intent.detail) {
            (RequestType::MediaElementChange, Detail::Media(media)) => self.reassign(OwnersPatch {
                media: Some(media.clone()),
                ..OwnersPatch::default()
            }),
            (RequestType::MediaElementChange, Detail::None) => self.reassign(OwnersPatch {
                media: Some(None),
                ..OwnersPatch::default()
            }),
            (RequestType::FullscreenElementChange, Detail::Element(element)) => {
                self.reassign(OwnersPatch {
                    fullscreen_element: Some(element.clone()),
                    ..OwnersPatch::default()
                })
            }
            (RequestType::FullscreenElementChange, Detail::None) => self.reassign(OwnersPatch {
                fullscreen_element: Some(None),
                ..OwnersPatch::default()
            }),
            (RequestType::DocumentElementChange, Detail::Document(document)) => {
                self.reassign(OwnersPatch {
                    document: Some(document.clone()),
                    ..OwnersPatch::default()
                })
            }
            (RequestType::DocumentElementChange, Detail::None) => self.reassign(OwnersPatch {
                document: Some(None),
                ..OwnersPatch::default()
            }),
            (RequestType::OptionsChange, Detail::Options(patch)) => {
                self.run_pass(OwnersPatch::default(), Some(patch))
            }
            (request, detail) if request.is_reassignment() => {
                log::warn!("{request} carries an unexpected detail: {detail:?}");
            }
            (request, detail) => {
                if self.state.borrow().has_error() {
                    log::debug!("ignoring {request} while a media error is set");
                    return;
                }
                let Some(handler) = self.requests.get(request) else {
                    log::trace!("no handler for {request}");
                    return;
                };
                let owners = self.owners.borrow().clone();
                if let Some(partial) = handler(&self.facade, &owners, detail) {
                    self.update_state(partial);
                }
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let wiring = std::mem::take(self.wiring.get_mut());
        for teardown in wiring.teardowns.into_iter().chain(wiring.option_teardowns) {
            teardown();
        }
        for (source, target) in wiring.targets {
            for property in self.facade.properties() {
                let Some((_, listener)) = self.listeners.iter().find(|(k, _)| *k == property.key)
                else {
                    continue;
                };
                for kind in property.events(source) {
                    target.remove(kind, listener);
                }
            }
        }
    }
}

/// A reactive store over one set of state owners.
///
/// Clones share the same store.
#[derive(Clone)]
pub struct MediaStore {
    inner: Rc<StoreInner>,
}

impl MediaStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Handle an intent. Unknown intent types are ignored.
    pub fn dispatch(&self, intent: Intent) {
        self.inner.dispatch(&intent);
    }

    /// The current snapshot.
    pub fn get_state(&self) -> MediaState {
        self.inner.state.borrow().clone()
    }

    /// Register `callback`. It is called once right away with the current
    /// snapshot and then on every change until the subscription is dropped
    /// through [`Subscription::unsubscribe`].
    pub fn subscribe(&self, callback: impl Fn(&MediaState) + 'static) -> Subscription {
        let inner = &self.inner;
        let count = inner.subscriber_count.get() + 1;
        inner.subscriber_count.set(count);
        if count == 1 && inner.monitor_only_with_subscriptions {
            inner.run_pass(OwnersPatch::default(), None);
        }

        let id = inner.next_subscriber.get();
        inner.next_subscriber.set(id + 1);
        let callback: Callback = Rc::new(callback);
        inner.subscribers.borrow_mut().push((id, callback.clone()));
        callback(&self.get_state());

        Subscription {
            store: Rc::downgrade(inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count.get()
    }

    /// True while listeners are wired and update handlers are active.
    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring()
    }

    /// A copy of the current state owners.
    pub fn owners(&self) -> StateOwners {
        self.inner.owners.borrow().clone()
    }

    pub fn options(&self) -> MediaOptions {
        self.inner.owners.borrow().options.clone()
    }

    pub fn platform(&self) -> &Rc<Platform> {
        &self.inner.platform
    }

    pub fn facade(&self) -> &Facade {
        &self.inner.facade
    }

    /// True while a reassignment is waiting for its microtask or for an
    /// element upgrade.
    pub fn has_pending_reassignment(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }
}

impl std::fmt::Debug for MediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStore")
            .field("owners", &self.inner.owners.borrow())
            .field("subscribers", &self.inner.subscriber_count.get())
            .field("monitoring", &self.inner.monitoring())
            .finish()
    }
}

/// Handle returned by [`MediaStore::subscribe`].
#[must_use = "dropping a subscription does not unsubscribe; call unsubscribe()"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    /// Stop receiving snapshots. The last subscriber leaving stops
    /// monitoring.
    pub fn unsubscribe(self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let removed = {
            let mut subscribers = inner.subscribers.borrow_mut();
            let before = subscribers.len();
            subscribers.retain(|(id, _)| *id != self.id);
            subscribers.len() != before
        };
        if !removed {
            return;
        }
        let count = inner.subscriber_count.get().saturating_sub(1);
        inner.subscriber_count.set(count);
        if count == 0 && inner.monitor_only_with_subscriptions {
            inner.run_pass(OwnersPatch::default(), None);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Builder for [`MediaStore`].
pub struct StoreBuilder {
    facade: Facade,
    requests: RequestMap,
    options: MediaOptions,
    platform: Option<Rc<Platform>>,
    owners: OwnersPatch,
    monitor_only_with_subscriptions: bool,
}

impl StoreBuilder {
    pub fn new() -> Self {
        StoreBuilder {
            facade: Facade::standard(),
            requests: RequestMap::standard(),
            options: MediaOptions::default(),
            platform: None,
            owners: OwnersPatch::default(),
            monitor_only_with_subscriptions: true,
        }
    }

    pub fn facade(mut self, facade: Facade) -> Self {
        self.facade = facade;
        self
    }

    pub fn requests(mut self, requests: RequestMap) -> Self {
        self.requests = requests;
        self
    }

    pub fn options(mut self, options: MediaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn platform(mut self, platform: Rc<Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn media(mut self, media: Rc<dyn MediaElement>) -> Self {
        self.owners.media = Some(Some(media));
        self
    }

    pub fn document(mut self, document: Rc<dyn DocumentRoot>) -> Self {
        self.owners.document = Some(Some(document));
        self
    }

    pub fn fullscreen_element(mut self, element: Rc<dyn Element>) -> Self {
        self.owners.fullscreen_element = Some(Some(element));
        self
    }

    /// When false the store monitors its owners even without subscribers.
    pub fn monitor_state_owners_only_with_subscriptions(mut self, only: bool) -> Self {
        self.monitor_only_with_subscriptions = only;
        self
    }

    /// Build the store. Owners that need no upgrade are assigned right away;
    /// otherwise assignment waits like any other reassignment.
    pub fn build(self) -> MediaStore {
        let platform = self.platform.unwrap_or_else(|| Rc::new(Platform::new()));
        let mut owners = StateOwners::new(platform.clone());
        owners.options = self.options;

        let mut seed = self.facade.evaluate(&owners);
        for key in StateKey::ALL.iter().filter(|k| k.is_preview()) {
            seed.insert(*key, StateValue::Unset);
        }

        let facade = self.facade;
        let inner = Rc::new_cyclic(|this: &Weak<StoreInner>| {
            let listeners = facade
                .properties()
                .iter()
                .map(|p| {
                    let key = p.key;
                    let this = this.clone();
                    let listener: Listener = Rc::new(move |event: &MediaEvent| {
                        if let Some(inner) = this.upgrade() {
                            inner.on_event(key, event);
                        }
                    });
                    (key, listener)
                })
                .collect();
            StoreInner {
                this: this.clone(),
                facade,
                requests: self.requests,
                platform,
                monitor_only_with_subscriptions: self.monitor_only_with_subscriptions,
                listeners,
                owners: RefCell::new(owners),
                state: RefCell::new(MediaState::from_map(seed)),
                subscribers: RefCell::new(Vec::new()),
                next_subscriber: Cell::new(0),
                subscriber_count: Cell::new(0),
                wiring: RefCell::new(Wiring::default()),
                pending: RefCell::new(None),
                flush_scheduled: Cell::new(false),
            }
        });

        if self.owners.pending_upgrades().is_empty() {
            inner.run_pass(self.owners, None);
        } else {
            inner.reassign(self.owners);
        }
        MediaStore { inner }
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;

    fn store_for(media: &Rc<HeadlessMedia>) -> MediaStore {
        let element: Rc<dyn MediaElement> = media.clone();
        MediaStore::builder().media(element).build()
    }

    #[test]
    fn construction_seeds_state_without_listeners() {
        let media = HeadlessMedia::new();
        media.set_muted(true);
        let store = store_for(&media);
        assert!(store.get_state().muted());
        assert!(store.get_state().contains(StateKey::MediaPreviewTime));
        assert!(!store.is_monitoring());
        assert_eq!(media.total_listeners(), 0);
    }

    #[test]
    fn first_subscriber_wires_listeners_and_last_unwires() {
        let media = HeadlessMedia::new();
        let store = store_for(&media);
        let sub = store.subscribe(|_| {});
        assert!(store.is_monitoring());
        assert!(media.listener_count("volumechange") >= 3);
        sub.unsubscribe();
        assert_eq!(media.total_listeners(), 0);
    }

    #[test]
    fn native_events_update_snapshot() {
        let media = HeadlessMedia::new();
        let store = store_for(&media);
        let sub = store.subscribe(|_| {});
        media.set_muted(true);
        assert!(store.get_state().muted());
        sub.unsubscribe();
    }

    #[test]
    fn reassignments_are_coalesced() {
        let a = HeadlessMedia::new();
        let b = HeadlessMedia::new();
        let c = HeadlessMedia::new();
        let store = store_for(&a);
        let sub = store.subscribe(|_| {});
        let (b_el, c_el): (Rc<dyn MediaElement>, Rc<dyn MediaElement>) = (b.clone(), c.clone());
        store.dispatch(Intent::media_change(Some(b_el)));
        store.dispatch(Intent::media_change(Some(c_el)));
        assert!(store.has_pending_reassignment());
        store.platform().tasks().run_until_idle();
        assert_eq!(a.total_listeners(), 0);
        assert_eq!(b.listener_calls(), (0, 0));
        assert!(c.total_listeners() > 0);
        sub.unsubscribe();
    }

    #[test]
    fn unmonitored_store_wires_without_subscribers() {
        let media = HeadlessMedia::new();
        let element: Rc<dyn MediaElement> = media.clone();
        let store = MediaStore::builder()
            .media(element)
            .monitor_state_owners_only_with_subscriptions(false)
            .build();
        assert!(store.is_monitoring());
        assert!(media.total_listeners() > 0);
        drop(store);
        assert_eq!(media.total_listeners(), 0);
    }
}
