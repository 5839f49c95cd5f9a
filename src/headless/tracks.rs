//! Headless track lists and remote playback.

use crate::error::{Error, Result};
use crate::platform::{
    AudioTrackList, EventTarget, Listener, ListenerSet, MediaEvent, RemotePlayback, RemoteState,
    RenditionList, TextTrack, TextTrackList,
};
use crate::state::{AudioTrackInfo, Cue, Rendition, TextTrackMode, TrackKind};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub struct HeadlessTextTrack {
    kind: TrackKind,
    language: String,
    label: String,
    src: Option<String>,
    default: bool,
    mode: Cell<TextTrackMode>,
    cues: RefCell<Vec<Cue>>,
    listeners: ListenerSet,
    list: RefCell<Weak<HeadlessTextTrackList>>,
}

impl HeadlessTextTrack {
    pub fn new(kind: TrackKind, language: &str, label: &str) -> Self {
        HeadlessTextTrack {
            kind,
            language: language.to_string(),
            label: label.to_string(),
            src: None,
            default: false,
            mode: Cell::new(TextTrackMode::Disabled),
            cues: RefCell::new(Vec::new()),
            listeners: ListenerSet::new(),
            list: RefCell::new(Weak::new()),
        }
    }

    pub fn with_src(mut self, src: &str) -> Self {
        self.src = Some(src.to_string());
        self
    }

    pub fn with_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn with_cues(self, cues: Vec<Cue>) -> Self {
        *self.cues.borrow_mut() = cues;
        self
    }

    /// Replace the cues and fire `load`, as a `<track>` does once fetched.
    pub fn load_cues(&self, cues: Vec<Cue>) {
        *self.cues.borrow_mut() = cues;
        self.listeners.emit(&MediaEvent::new("load"));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessTextTrack {
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

impl TextTrack for HeadlessTextTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }

    fn mode(&self) -> TextTrackMode {
        self.mode.get()
    }

    fn set_mode(&self, mode: TextTrackMode) {
        if self.mode.replace(mode) == mode {
            return;
        }
        let list = self.list.borrow().upgrade();
        if let Some(list) = list {
            list.listeners.emit(&MediaEvent::new("change"));
        }
    }

    fn cues(&self) -> Vec<Cue> {
        self.cues.borrow().clone()
    }

    fn src(&self) -> Option<String> {
        self.src.clone()
    }

    fn is_default(&self) -> bool {
        self.default
    }
}

pub struct HeadlessTextTrackList {
    this: Weak<HeadlessTextTrackList>,
    tracks: RefCell<Vec<Rc<HeadlessTextTrack>>>,
    listeners: ListenerSet,
}

impl HeadlessTextTrackList {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| HeadlessTextTrackList {
            this: this.clone(),
            tracks: RefCell::new(Vec::new()),
            listeners: ListenerSet::new(),
        })
    }

    /// Append a track and fire `addtrack`.
    pub fn add(&self, track: HeadlessTextTrack) -> Rc<HeadlessTextTrack> {
        *track.list.borrow_mut() = self.this.clone();
        let kind = track.kind;
        let track = Rc::new(track);
        self.tracks.borrow_mut().push(track.clone());
        self.listeners.emit(&MediaEvent::for_track("addtrack", kind));
        track
    }

    pub fn add_track(&self, kind: TrackKind, language: &str, label: &str) -> Rc<HeadlessTextTrack> {
        self.add(HeadlessTextTrack::new(kind, language, label))
    }

    pub fn remove(&self, track: &Rc<HeadlessTextTrack>) {
        let removed = {
            let mut tracks = self.tracks.borrow_mut();
            let before = tracks.len();
            tracks.retain(|t| !Rc::ptr_eq(t, track));
            before != tracks.len()
        };
        if removed {
            *track.list.borrow_mut() = Weak::new();
            self.listeners
                .emit(&MediaEvent::for_track("removetrack", track.kind));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessTextTrackList {
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

impl TextTrackList for HeadlessTextTrackList {
    fn tracks(&self) -> Vec<Rc<dyn TextTrack>> {
        self.tracks
            .borrow()
            .iter()
            .map(|t| {
                let t: Rc<dyn TextTrack> = t.clone();
                t
            })
            .collect()
    }
}

#[derive(Default)]
pub struct HeadlessRenditionList {
    renditions: RefCell<Vec<Rendition>>,
    selected: Cell<Option<usize>>,
    listeners: ListenerSet,
}

impl HeadlessRenditionList {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add(&self, rendition: Rendition) {
        self.renditions.borrow_mut().push(rendition);
        self.listeners.emit(&MediaEvent::new("addrendition"));
    }

    pub fn remove(&self, id: &str) {
        let removed = {
            let mut list = self.renditions.borrow_mut();
            let before = list.len();
            list.retain(|r| r.id != id);
            before != list.len()
        };
        if removed {
            self.selected.set(None);
            self.listeners.emit(&MediaEvent::new("removerendition"));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessRenditionList {
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

impl RenditionList for HeadlessRenditionList {
    fn renditions(&self) -> Vec<Rendition> {
        self.renditions.borrow().clone()
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected.get()
    }

    fn set_selected_index(&self, index: Option<usize>) {
        let index = index.filter(|i| *i < self.renditions.borrow().len());
        if self.selected.replace(index) != index {
            self.listeners.emit(&MediaEvent::new("change"));
        }
    }
}

#[derive(Default)]
pub struct HeadlessAudioTrackList {
    tracks: RefCell<Vec<AudioTrackInfo>>,
    listeners: ListenerSet,
}

impl HeadlessAudioTrackList {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add(&self, track: AudioTrackInfo) {
        self.tracks.borrow_mut().push(track);
        self.listeners.emit(&MediaEvent::new("addtrack"));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessAudioTrackList {
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

impl AudioTrackList for HeadlessAudioTrackList {
    fn tracks(&self) -> Vec<AudioTrackInfo> {
        self.tracks.borrow().clone()
    }

    fn set_enabled(&self, id: &str, enabled: bool) {
        let changed = {
            let mut tracks = self.tracks.borrow_mut();
            match tracks.iter_mut().find(|t| t.id == id) {
                Some(t) if t.enabled != enabled => {
                    t.enabled = enabled;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.listeners.emit(&MediaEvent::new("change"));
        }
    }
}

/// Remote playback with a scriptable device list.
pub struct HeadlessRemote {
    state: Cell<RemoteState>,
    /// `None` means availability watching is not supported.
    devices_available: Cell<Option<bool>>,
    watchers: RefCell<Vec<Rc<dyn Fn(bool)>>>,
    watch_calls: Cell<usize>,
    listeners: ListenerSet,
}

impl HeadlessRemote {
    pub fn new() -> Rc<Self> {
        Rc::new(HeadlessRemote {
            state: Cell::new(RemoteState::Disconnected),
            devices_available: Cell::new(Some(false)),
            watchers: RefCell::new(Vec::new()),
            watch_calls: Cell::new(0),
            listeners: ListenerSet::new(),
        })
    }

    /// Change device availability, notifying an active watcher.
    pub fn set_devices_available(&self, available: Option<bool>) {
        self.devices_available.set(available);
        let Some(avail) = available else {
            return;
        };
        let watchers = self.watchers.borrow().clone();
        for cb in watchers {
            cb(avail);
        }
    }

    pub fn is_watching(&self) -> bool {
        !self.watchers.borrow().is_empty()
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.get()
    }

    fn transition(&self, state: RemoteState, event: &str) {
        self.state.set(state);
        self.listeners.emit(&MediaEvent::new(event));
    }
}

impl EventTarget for HeadlessRemote {
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

impl RemotePlayback for HeadlessRemote {
    fn state(&self) -> RemoteState {
        self.state.get()
    }

    fn prompt(&self) -> Result<()> {
        match self.state.get() {
            RemoteState::Disconnected => {
                if self.devices_available.get() != Some(true) {
                    return Err(Error::NotAllowed("no remote playback devices".into()));
                }
                self.transition(RemoteState::Connecting, "connecting");
                self.transition(RemoteState::Connected, "connect");
            }
            RemoteState::Connected | RemoteState::Connecting => {
                self.transition(RemoteState::Disconnected, "disconnect");
            }
        }
        Ok(())
    }

    fn watch_availability(&self, callback: Rc<dyn Fn(bool)>) -> Result<()> {
        self.watch_calls.set(self.watch_calls.get() + 1);
        let Some(available) = self.devices_available.get() else {
            return Err(Error::NotSupported("watchAvailability".into()));
        };
        self.watchers.borrow_mut().push(callback.clone());
        callback(available);
        Ok(())
    }

    fn cancel_watch_availability(&self) -> Result<()> {
        self.watchers.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_change_fires_on_owning_list() {
        let list = HeadlessTextTrackList::new();
        let changes = Rc::new(Cell::new(0));
        let c = changes.clone();
        list.add_event_listener("change", Rc::new(move |_: &MediaEvent| c.set(c.get() + 1)));
        let track = list.add_track(TrackKind::Subtitles, "en", "English");
        track.set_mode(TextTrackMode::Showing);
        track.set_mode(TextTrackMode::Showing);
        assert_eq!(changes.get(), 1);
    }

    #[test]
    fn remote_prompt_connects_then_disconnects() {
        let remote = HeadlessRemote::new();
        assert!(remote.prompt().is_err());
        remote.set_devices_available(Some(true));
        remote.prompt().unwrap();
        assert_eq!(remote.state(), RemoteState::Connected);
        remote.prompt().unwrap();
        assert_eq!(remote.state(), RemoteState::Disconnected);
    }

    #[test]
    fn unsupported_watch_is_an_error() {
        let remote = HeadlessRemote::new();
        remote.set_devices_available(None);
        assert!(remote.watch_availability(Rc::new(|_| {})).is_err());
        assert!(!remote.is_watching());
    }
}
