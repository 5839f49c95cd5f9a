//! State owner interfaces: media elements, documents, track lists
//!
//! The store never talks to a concrete media implementation. It reads and
//! mutates state owners only through the traits in this module, so a real
//! player binding and the deterministic [`crate::headless`] owners are
//! interchangeable.

pub mod storage;
pub mod tracks;

pub use storage::{JsonFileStorage, MemoryStorage, PreferenceStore};
pub use tracks::{AudioTrackList, RemotePlayback, RemoteState, RenditionList, TextTrack, TextTrackList};

use crate::error::{Error, Result};
use crate::state::{MediaErrorInfo, TrackKind};
use crate::tasks::TaskQueue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide identity for elements, documents and media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub fn next() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Remote playback availability reported by `watchAvailability` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAvailability {
    Available,
    NotAvailable,
    /// The watch itself is not supported by the platform.
    NotSupported,
}

/// A native event fired by a state owner.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    pub kind: String,
    /// Kind of the track for `addtrack` / `removetrack`.
    pub track_kind: Option<TrackKind>,
    pub availability: Option<RemoteAvailability>,
}

impl MediaEvent {
    pub fn new(kind: &str) -> Self {
        MediaEvent {
            kind: kind.to_string(),
            track_kind: None,
            availability: None,
        }
    }

    pub fn for_track(kind: &str, track_kind: TrackKind) -> Self {
        MediaEvent {
            track_kind: Some(track_kind),
            ..MediaEvent::new(kind)
        }
    }

    pub fn with_availability(kind: &str, availability: RemoteAvailability) -> Self {
        MediaEvent {
            availability: Some(availability),
            ..MediaEvent::new(kind)
        }
    }
}

/// Event callback. Listeners are removed by pointer identity.
pub type Listener = Rc<dyn Fn(&MediaEvent)>;

/// Pointer identity for listeners (ignores vtable differences).
pub fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Pointer identity for any shared state owner.
pub fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

pub trait EventTarget {
    fn add_event_listener(&self, kind: &str, listener: Listener);
    fn remove_event_listener(&self, kind: &str, listener: &Listener);
    fn dispatch_event(&self, event: &MediaEvent);
}

/// Listener bookkeeping shared by the headless owners.
///
/// Adding the same `(kind, listener)` pair twice is a no-op. Effective adds
/// and removes are counted so tests can check listener symmetry.
#[derive(Default)]
pub struct ListenerSet {
    entries: RefCell<Vec<(String, Listener)>>,
    added: Cell<usize>,
    removed: Cell<usize>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: &str, listener: Listener) {
        let mut entries = self.entries.borrow_mut();
        if entries
            .iter()
            .any(|(k, l)| k == kind && same_listener(l, &listener))
        {
            return;
        }
        entries.push((kind.to_string(), listener));
        self.added.set(self.added.get() + 1);
    }

    pub fn remove(&self, kind: &str, listener: &Listener) {
        let mut entries = self.entries.borrow_mut();
        if let Some(pos) = entries
            .iter()
            .position(|(k, l)| k == kind && same_listener(l, listener))
        {
            entries.remove(pos);
            self.removed.set(self.removed.get() + 1);
        }
    }

    /// Call every listener registered for `event.kind`. The listener list is
    /// snapshotted first so callbacks may add or remove listeners.
    pub fn emit(&self, event: &MediaEvent) {
        let listeners: Vec<Listener> = self
            .entries
            .borrow()
            .iter()
            .filter(|(k, _)| *k == event.kind)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn count(&self, kind: &str) -> usize {
        self.entries.borrow().iter().filter(|(k, _)| k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn adds(&self) -> usize {
        self.added.get()
    }

    pub fn removes(&self) -> usize {
        self.removed.get()
    }
}

/// Anything the store may hold as an element: the media, the fullscreen
/// target, the picture-in-picture element.
pub trait Element: EventTarget {
    fn node_id(&self) -> NodeId;

    fn local_name(&self) -> String;

    fn is_custom(&self) -> bool {
        self.local_name().contains('-')
    }

    /// False for a custom element whose definition has not been applied yet.
    fn is_upgraded(&self) -> bool {
        true
    }

    /// Run `callback` once the element is upgraded (immediately if it already is).
    fn when_upgraded(&self, callback: Box<dyn FnOnce()>) {
        callback()
    }

    fn has_attribute(&self, _name: &str) -> bool {
        false
    }

    fn request_fullscreen(&self) -> Result<()> {
        Err(Error::NotSupported("requestFullscreen".into()))
    }
}

/// Capability set, probed once when a media element is assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub volume: bool,
    pub picture_in_picture: bool,
    pub webkit_fullscreen: bool,
    pub request_fullscreen: bool,
    pub text_tracks: bool,
    pub video_renditions: bool,
    pub audio_tracks: bool,
    pub remote_playback: bool,
    pub airplay_picker: bool,
}

/// Playback primitives of a media element.
///
/// Optional capabilities have defaults that report "unsupported", so a
/// minimal implementation only provides the core accessors.
pub trait MediaElement: Element {
    fn as_element(self: Rc<Self>) -> Rc<dyn Element>;

    fn paused(&self) -> bool;
    fn play(&self) -> Result<()>;
    fn pause(&self);
    fn ended(&self) -> bool;

    fn current_time(&self) -> f64;
    fn set_current_time(&self, time: f64);
    fn duration(&self) -> f64;

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    /// `None` when the element does not expose volume at all.
    fn volume(&self) -> Option<f64>;
    fn set_volume(&self, volume: f64);

    fn ready_state(&self) -> u8;
    fn src(&self) -> String {
        String::new()
    }
    fn preload(&self) -> String {
        "auto".into()
    }
    fn set_preload(&self, _preload: &str) {}

    fn video_width(&self) -> Option<f64> {
        None
    }
    fn video_height(&self) -> Option<f64> {
        None
    }

    /// `None` when the element has no seekable ranges object at all.
    fn seekable(&self) -> Option<Vec<(f64, f64)>>;
    fn buffered(&self) -> Vec<(f64, f64)> {
        Vec::new()
    }

    fn error(&self) -> Option<MediaErrorInfo> {
        None
    }

    /// Explicit stream type, for elements that know it.
    fn stream_type(&self) -> Option<String> {
        None
    }
    fn target_live_window(&self) -> Option<f64> {
        None
    }
    fn live_edge_start(&self) -> Option<f64> {
        None
    }

    fn text_tracks(&self) -> Option<Rc<dyn TextTrackList>> {
        None
    }
    fn video_renditions(&self) -> Option<Rc<dyn RenditionList>> {
        None
    }
    fn audio_tracks(&self) -> Option<Rc<dyn AudioTrackList>> {
        None
    }
    fn remote(&self) -> Option<Rc<dyn RemotePlayback>> {
        None
    }
    fn disable_remote_playback(&self) -> bool {
        self.has_attribute("disableremoteplayback")
    }

    fn request_picture_in_picture(&self) -> Result<()> {
        Err(Error::NotSupported("requestPictureInPicture".into()))
    }
    fn webkit_enter_fullscreen(&self) -> Result<()> {
        Err(Error::NotSupported("webkitEnterFullscreen".into()))
    }
    fn webkit_displaying_fullscreen(&self) -> bool {
        false
    }
    fn webkit_show_playback_target_picker(&self) -> Result<()> {
        Err(Error::NotSupported("webkitShowPlaybackTargetPicker".into()))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            volume: self.volume().is_some(),
            text_tracks: self.text_tracks().is_some(),
            video_renditions: self.video_renditions().is_some(),
            audio_tracks: self.audio_tracks().is_some(),
            remote_playback: self.remote().is_some(),
            ..Capabilities::default()
        }
    }
}

/// Root node used for fullscreen and picture-in-picture queries.
pub trait DocumentRoot: EventTarget {
    fn node_id(&self) -> NodeId;

    fn fullscreen_enabled(&self) -> bool;
    fn fullscreen_element(&self) -> Option<Rc<dyn Element>>;
    fn enter_fullscreen(&self, element: Rc<dyn Element>) -> Result<()>;
    fn exit_fullscreen(&self) -> Result<()>;

    fn picture_in_picture_enabled(&self) -> bool;
    fn picture_in_picture_element(&self) -> Option<Rc<dyn Element>>;
    fn enter_picture_in_picture(&self, element: Rc<dyn Element>) -> Result<()>;
    fn exit_picture_in_picture(&self) -> Result<()>;

    /// True when `node` is `ancestor` or lives below it, crossing shadow roots.
    fn contains_composed(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node
    }
}

/// Feature support of the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSupport {
    pub fullscreen: bool,
    pub picture_in_picture: bool,
    pub airplay: bool,
    pub cast: bool,
}

impl Default for PlatformSupport {
    fn default() -> Self {
        PlatformSupport {
            fullscreen: true,
            picture_in_picture: true,
            airplay: false,
            cast: true,
        }
    }
}

type MediaFactory = Box<dyn Fn() -> Option<Rc<dyn MediaElement>>>;

/// Explicit process-wide environment shared by every store built on it:
/// preferred languages, the preference store, feature support, the volume
/// probe and the task queue.
pub struct Platform {
    languages: RefCell<Vec<String>>,
    storage: Rc<dyn PreferenceStore>,
    support: PlatformSupport,
    volume_probe: MediaFactory,
    volume_supported: Cell<Option<bool>>,
    tasks: TaskQueue,
}

impl Platform {
    /// Headless defaults: English, in-memory storage, a headless probe media.
    pub fn new() -> Self {
        Platform {
            languages: RefCell::new(vec!["en-US".into(), "en".into()]),
            storage: Rc::new(MemoryStorage::new()),
            support: PlatformSupport::default(),
            volume_probe: Box::new(|| {
                let media: Rc<dyn MediaElement> = crate::headless::HeadlessMedia::new();
                Some(media)
            }),
            volume_supported: Cell::new(None),
            tasks: TaskQueue::new(),
        }
    }

    pub fn with_storage(mut self, storage: Rc<dyn PreferenceStore>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_support(mut self, support: PlatformSupport) -> Self {
        self.support = support;
        self
    }

    pub fn with_languages<I, S>(self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_languages(languages);
        self
    }

    /// Factory for the throwaway media the volume probe writes to.
    pub fn with_volume_probe(
        mut self,
        factory: impl Fn() -> Option<Rc<dyn MediaElement>> + 'static,
    ) -> Self {
        self.volume_probe = Box::new(factory);
        self.volume_supported.set(None);
        self
    }

    pub fn with_tasks(mut self, tasks: TaskQueue) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.borrow().clone()
    }

    /// The one setter for the preferred language list.
    pub fn set_languages<I, S>(&self, languages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.languages.borrow_mut() = languages.into_iter().map(Into::into).collect();
    }

    pub fn storage(&self) -> &Rc<dyn PreferenceStore> {
        &self.storage
    }

    pub fn support(&self) -> PlatformSupport {
        self.support
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Cached result of the volume probe, `None` until it has run.
    pub fn volume_supported(&self) -> Option<bool> {
        self.volume_supported.get()
    }

    /// Run the volume probe once and cache the answer.
    ///
    /// Writes `volume / 2 + 0.1` to a throwaway media; platforms that ignore
    /// volume writes leave the value unchanged.
    pub fn resolve_volume_support(&self) -> bool {
        if let Some(known) = self.volume_supported.get() {
            return known;
        }
        let supported = match (self.volume_probe)() {
            Some(media) => match media.volume() {
                Some(before) => {
                    media.set_volume(before / 2.0 + 0.1);
                    media.volume() != Some(before)
                }
                None => false,
            },
            None => false,
        };
        log::debug!("volume support probe resolved to {supported}");
        self.volume_supported.set(Some(supported));
        supported
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("languages", &self.languages.borrow())
            .field("support", &self.support)
            .field("volume_supported", &self.volume_supported.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;

    #[test]
    fn listener_set_dedups_and_counts() {
        let set = ListenerSet::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let l: Listener = Rc::new(move |_: &MediaEvent| h.set(h.get() + 1));
        set.add("play", l.clone());
        set.add("play", l.clone());
        assert_eq!(set.count("play"), 1);
        set.emit(&MediaEvent::new("play"));
        set.emit(&MediaEvent::new("pause"));
        assert_eq!(hits.get(), 1);
        set.remove("play", &l);
        assert!(set.is_empty());
        assert_eq!((set.adds(), set.removes()), (1, 1));
    }

    #[test]
    fn volume_probe_is_cached() {
        let platform = Platform::new();
        assert_eq!(platform.volume_supported(), None);
        assert!(platform.resolve_volume_support());
        assert_eq!(platform.volume_supported(), Some(true));
    }

    #[test]
    fn volume_probe_detects_locked_volume() {
        let platform = Platform::new().with_volume_probe(|| {
            let media = HeadlessMedia::new();
            media.lock_volume(true);
            let media: Rc<dyn MediaElement> = media;
            Some(media)
        });
        assert!(!platform.resolve_volume_support());
    }

    #[test]
    fn languages_setter_replaces_list() {
        let platform = Platform::new().with_languages(["fr-CA"]);
        assert_eq!(platform.languages(), vec!["fr-CA".to_string()]);
        platform.set_languages(["de", "en"]);
        assert_eq!(platform.languages().len(), 2);
    }
}
