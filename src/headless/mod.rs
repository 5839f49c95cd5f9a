//! Deterministic in-memory state owners
//!
//! [`HeadlessMedia`] behaves like a media element driven by a script: every
//! setter updates its state and fires the native events a browser would,
//! synchronously. Listener adds and removes are counted so tests can verify
//! that the store leaves nothing behind.

pub mod tracks;

pub use tracks::{
    HeadlessAudioTrackList, HeadlessRemote, HeadlessRenditionList, HeadlessTextTrack,
    HeadlessTextTrackList,
};

use crate::error::{Error, Result};
use crate::platform::{
    AudioTrackList, Capabilities, DocumentRoot, Element, EventTarget, Listener, ListenerSet,
    MediaElement, MediaEvent, NodeId, RemotePlayback, RenditionList, TextTrackList,
};
use crate::state::MediaErrorInfo;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

pub struct HeadlessMedia {
    id: NodeId,
    this: Weak<HeadlessMedia>,
    local_name: String,
    listeners: ListenerSet,
    attributes: RefCell<BTreeSet<String>>,
    upgraded: Cell<bool>,
    upgrade_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,

    paused: Cell<bool>,
    ended: Cell<bool>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
    playback_rate: Cell<f64>,
    muted: Cell<bool>,
    volume: Cell<Option<f64>>,
    volume_locked: Cell<bool>,
    reject_play: Cell<bool>,
    ready_state: Cell<u8>,
    src: RefCell<String>,
    preload: RefCell<String>,
    video_size: Cell<Option<(f64, f64)>>,
    seekable: RefCell<Option<Vec<(f64, f64)>>>,
    buffered: RefCell<Vec<(f64, f64)>>,
    error: RefCell<Option<MediaErrorInfo>>,
    stream_type: RefCell<Option<String>>,
    target_live_window: Cell<Option<f64>>,
    live_edge_start: Cell<Option<f64>>,
    webkit_fullscreen: Cell<bool>,

    text_tracks: RefCell<Option<Rc<HeadlessTextTrackList>>>,
    renditions: RefCell<Option<Rc<HeadlessRenditionList>>>,
    audio_tracks: RefCell<Option<Rc<HeadlessAudioTrackList>>>,
    remote: RefCell<Option<Rc<HeadlessRemote>>>,
    capabilities: Cell<Capabilities>,
    document: RefCell<Option<Weak<dyn DocumentRoot>>>,
}

impl HeadlessMedia {
    /// A `video` element with volume, text tracks, fullscreen and PiP support.
    pub fn new() -> Rc<Self> {
        Self::with_name("video", true)
    }

    /// A custom element (`local_name` must contain a dash) that stays
    /// un-upgraded until [`HeadlessMedia::upgrade`] is called.
    pub fn undefined(local_name: &str) -> Rc<Self> {
        Self::with_name(local_name, false)
    }

    fn with_name(local_name: &str, upgraded: bool) -> Rc<Self> {
        Rc::new_cyclic(|this| HeadlessMedia {
            id: NodeId::next(),
            this: this.clone(),
            local_name: local_name.to_string(),
            listeners: ListenerSet::new(),
            attributes: RefCell::new(BTreeSet::new()),
            upgraded: Cell::new(upgraded),
            upgrade_callbacks: RefCell::new(Vec::new()),
            paused: Cell::new(true),
            ended: Cell::new(false),
            current_time: Cell::new(0.0),
            duration: Cell::new(f64::NAN),
            playback_rate: Cell::new(1.0),
            muted: Cell::new(false),
            volume: Cell::new(Some(1.0)),
            volume_locked: Cell::new(false),
            reject_play: Cell::new(false),
            ready_state: Cell::new(0),
            src: RefCell::new(String::new()),
            preload: RefCell::new("auto".into()),
            video_size: Cell::new(None),
            seekable: RefCell::new(Some(Vec::new())),
            buffered: RefCell::new(Vec::new()),
            error: RefCell::new(None),
            stream_type: RefCell::new(None),
            target_live_window: Cell::new(None),
            live_edge_start: Cell::new(None),
            webkit_fullscreen: Cell::new(false),
            text_tracks: RefCell::new(Some(HeadlessTextTrackList::new())),
            renditions: RefCell::new(None),
            audio_tracks: RefCell::new(None),
            remote: RefCell::new(None),
            capabilities: Cell::new(Capabilities {
                volume: true,
                picture_in_picture: true,
                request_fullscreen: true,
                text_tracks: true,
                ..Capabilities::default()
            }),
            document: RefCell::new(None),
        })
    }

    fn emit(&self, kind: &str) {
        self.listeners.emit(&MediaEvent::new(kind));
    }

    /// Fire an arbitrary native event.
    pub fn fire(&self, event: MediaEvent) {
        self.listeners.emit(&event);
    }

    pub fn upgrade(&self) {
        if self.upgraded.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.upgrade_callbacks.borrow_mut());
        for cb in callbacks {
            cb();
        }
    }

    /// Document used for fullscreen and picture-in-picture requests.
    pub fn set_document(&self, document: &Rc<dyn DocumentRoot>) {
        *self.document.borrow_mut() = Some(Rc::downgrade(document));
    }

    fn document(&self) -> Option<Rc<dyn DocumentRoot>> {
        self.document.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn rc(&self) -> Result<Rc<HeadlessMedia>> {
        self.this
            .upgrade()
            .ok_or_else(|| Error::InvalidState("media dropped".into()))
    }

    pub fn set_attribute(&self, name: &str) {
        self.attributes.borrow_mut().insert(name.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.attributes.borrow_mut().remove(name);
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.capabilities.set(capabilities);
    }

    /// Ignore volume writes, like platforms that only allow hardware volume.
    pub fn lock_volume(&self, locked: bool) {
        self.volume_locked.set(locked);
    }

    /// Drop the volume property entirely.
    pub fn remove_volume(&self) {
        self.volume.set(None);
        let mut caps = self.capabilities.get();
        caps.volume = false;
        self.capabilities.set(caps);
    }

    /// Make subsequent `play()` calls reject.
    pub fn reject_play(&self, reject: bool) {
        self.reject_play.set(reject);
    }

    /// Start loading `src`: fires `loadstart`.
    pub fn load(&self, src: &str) {
        *self.src.borrow_mut() = src.to_string();
        self.ready_state.set(0);
        self.emit("loadstart");
    }

    /// Metadata arrived: duration is known, readyState becomes 1.
    pub fn load_metadata(&self, duration: f64) {
        self.duration.set(duration);
        self.ready_state.set(1);
        self.emit("durationchange");
        self.emit("loadedmetadata");
    }

    pub fn set_duration(&self, duration: f64) {
        self.duration.set(duration);
        self.emit("durationchange");
    }

    pub fn set_ready_state(&self, state: u8) {
        let before = self.ready_state.replace(state);
        if state < 3 && before >= 3 {
            self.emit("waiting");
        }
    }

    pub fn set_seekable(&self, ranges: Option<Vec<(f64, f64)>>) {
        *self.seekable.borrow_mut() = ranges;
        self.emit("seekablechange");
    }

    pub fn set_buffered(&self, ranges: Vec<(f64, f64)>) {
        *self.buffered.borrow_mut() = ranges;
        self.emit("progress");
    }

    pub fn set_stream_type(&self, stream_type: Option<&str>) {
        *self.stream_type.borrow_mut() = stream_type.map(str::to_string);
        self.emit("streamtypechange");
    }

    pub fn set_target_live_window(&self, window: Option<f64>) {
        self.target_live_window.set(window);
        self.emit("targetlivewindowchange");
    }

    pub fn set_live_edge_start(&self, start: Option<f64>) {
        self.live_edge_start.set(start);
    }

    pub fn set_video_size(&self, width: f64, height: f64) {
        self.video_size.set(Some((width, height)));
        self.emit("resize");
    }

    /// Advance playback without seeking.
    pub fn tick(&self, time: f64) {
        self.current_time.set(time);
        self.emit("timeupdate");
    }

    /// Report a fatal error.
    pub fn fail(&self, code: u16, message: &str) {
        *self.error.borrow_mut() = Some(MediaErrorInfo {
            code,
            message: message.to_string(),
        });
        self.emit("error");
    }

    /// Reset to the empty state and fire `emptied`.
    pub fn empty(&self) {
        self.error.borrow_mut().take();
        self.paused.set(true);
        self.ended.set(false);
        self.current_time.set(0.0);
        self.duration.set(f64::NAN);
        self.ready_state.set(0);
        self.emit("emptied");
    }

    pub fn end(&self) {
        self.ended.set(true);
        self.paused.set(true);
        self.emit("pause");
        self.emit("ended");
    }

    /// The text track list, available unless removed by capabilities.
    pub fn text_track_list(&self) -> Option<Rc<HeadlessTextTrackList>> {
        self.text_tracks.borrow().clone()
    }

    /// Attach a rendition list (adaptive streaming).
    pub fn attach_renditions(&self) -> Rc<HeadlessRenditionList> {
        let list = HeadlessRenditionList::new();
        *self.renditions.borrow_mut() = Some(list.clone());
        let mut caps = self.capabilities.get();
        caps.video_renditions = true;
        self.capabilities.set(caps);
        list
    }

    pub fn attach_audio_tracks(&self) -> Rc<HeadlessAudioTrackList> {
        let list = HeadlessAudioTrackList::new();
        *self.audio_tracks.borrow_mut() = Some(list.clone());
        let mut caps = self.capabilities.get();
        caps.audio_tracks = true;
        self.capabilities.set(caps);
        list
    }

    pub fn attach_remote(&self) -> Rc<HeadlessRemote> {
        let remote = HeadlessRemote::new();
        *self.remote.borrow_mut() = Some(remote.clone());
        let mut caps = self.capabilities.get();
        caps.remote_playback = true;
        self.capabilities.set(caps);
        remote
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.listeners.count(kind)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Effective `(adds, removes)` over the media's lifetime.
    pub fn listener_calls(&self) -> (usize, usize) {
        (self.listeners.adds(), self.listeners.removes())
    }
}

impl EventTarget for HeadlessMedia {
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

impl Element for HeadlessMedia {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn local_name(&self) -> String {
        self.local_name.clone()
    }

    fn is_upgraded(&self) -> bool {
        self.upgraded.get()
    }

    fn when_upgraded(&self, callback: Box<dyn FnOnce()>) {
        if self.upgraded.get() {
            callback();
        } else {
            self.upgrade_callbacks.borrow_mut().push(callback);
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains(name)
    }

    fn request_fullscreen(&self) -> Result<()> {
        if !self.capabilities.get().request_fullscreen {
            return Err(Error::NotSupported("requestFullscreen".into()));
        }
        let document = self
            .document()
            .ok_or_else(|| Error::NotSupported("media is not in a document".into()))?;
        let me: Rc<dyn Element> = self.rc()?;
        document.enter_fullscreen(me)
    }
}

impl MediaElement for HeadlessMedia {
    fn as_element(self: Rc<Self>) -> Rc<dyn Element> {
        self
    }

    fn paused(&self) -> bool {
        self.paused.get()
    }

    fn play(&self) -> Result<()> {
        if self.reject_play.get() {
            return Err(Error::NotAllowed("play() requires a user gesture".into()));
        }
        if self.paused.replace(false) {
            self.ended.set(false);
            self.emit("play");
            self.emit("playing");
        }
        Ok(())
    }

    fn pause(&self) {
        if !self.paused.replace(true) {
            self.emit("pause");
        }
    }

    fn ended(&self) -> bool {
        self.ended.get()
    }

    fn current_time(&self) -> f64 {
        self.current_time.get()
    }

    fn set_current_time(&self, time: f64) {
        self.current_time.set(time);
        self.ended.set(false);
        self.emit("seeking");
        self.emit("timeupdate");
        self.emit("seeked");
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn playback_rate(&self) -> f64 {
        self.playback_rate.get()
    }

    fn set_playback_rate(&self, rate: f64) {
        if self.playback_rate.replace(rate) != rate {
            self.emit("ratechange");
        }
    }

    fn muted(&self) -> bool {
        self.muted.get()
    }

    fn set_muted(&self, muted: bool) {
        if self.muted.replace(muted) != muted {
            self.emit("volumechange");
        }
    }

    fn volume(&self) -> Option<f64> {
        self.volume.get()
    }

    fn set_volume(&self, volume: f64) {
        if self.volume_locked.get() {
            return;
        }
        let Some(current) = self.volume.get() else {
            return;
        };
        let next = volume.clamp(0.0, 1.0);
        if current != next {
            self.volume.set(Some(next));
            self.emit("volumechange");
        }
    }

    fn ready_state(&self) -> u8 {
        self.ready_state.get()
    }

    fn src(&self) -> String {
        self.src.borrow().clone()
    }

    fn preload(&self) -> String {
        self.preload.borrow().clone()
    }

    fn set_preload(&self, preload: &str) {
        *self.preload.borrow_mut() = preload.to_string();
    }

    fn video_width(&self) -> Option<f64> {
        self.video_size.get().map(|(w, _)| w)
    }

    fn video_height(&self) -> Option<f64> {
        self.video_size.get().map(|(_, h)| h)
    }

    fn seekable(&self) -> Option<Vec<(f64, f64)>> {
        self.seekable.borrow().clone()
    }

    fn buffered(&self) -> Vec<(f64, f64)> {
        self.buffered.borrow().clone()
    }

    fn error(&self) -> Option<MediaErrorInfo> {
        self.error.borrow().clone()
    }

    fn stream_type(&self) -> Option<String> {
        self.stream_type.borrow().clone()
    }

    fn target_live_window(&self) -> Option<f64> {
        self.target_live_window.get()
    }

    fn live_edge_start(&self) -> Option<f64> {
        self.live_edge_start.get()
    }

    fn text_tracks(&self) -> Option<Rc<dyn TextTrackList>> {
        self.text_tracks.borrow().clone().map(|l| {
            let l: Rc<dyn TextTrackList> = l;
            l
        })
    }

    fn video_renditions(&self) -> Option<Rc<dyn RenditionList>> {
        self.renditions.borrow().clone().map(|l| {
            let l: Rc<dyn RenditionList> = l;
            l
        })
    }

    fn audio_tracks(&self) -> Option<Rc<dyn AudioTrackList>> {
        self.audio_tracks.borrow().clone().map(|l| {
            let l: Rc<dyn AudioTrackList> = l;
            l
        })
    }

    fn remote(&self) -> Option<Rc<dyn RemotePlayback>> {
        self.remote.borrow().clone().map(|r| {
            let r: Rc<dyn RemotePlayback> = r;
            r
        })
    }

    fn request_picture_in_picture(&self) -> Result<()> {
        if !self.capabilities.get().picture_in_picture {
            return Err(Error::NotSupported("requestPictureInPicture".into()));
        }
        if self.ready_state.get() == 0 {
            return Err(Error::InvalidState("media has no metadata yet".into()));
        }
        let document = self
            .document()
            .ok_or_else(|| Error::NotSupported("media is not in a document".into()))?;
        let me: Rc<dyn Element> = self.rc()?;
        document.enter_picture_in_picture(me)
    }

    fn webkit_enter_fullscreen(&self) -> Result<()> {
        if !self.capabilities.get().webkit_fullscreen {
            return Err(Error::NotSupported("webkitEnterFullscreen".into()));
        }
        if !self.webkit_fullscreen.replace(true) {
            self.emit("webkitbeginfullscreen");
        }
        Ok(())
    }

    fn webkit_displaying_fullscreen(&self) -> bool {
        self.webkit_fullscreen.get()
    }

    fn webkit_show_playback_target_picker(&self) -> Result<()> {
        if !self.capabilities.get().airplay_picker {
            return Err(Error::NotSupported("webkitShowPlaybackTargetPicker".into()));
        }
        self.emit("webkitcurrentplaybacktargetiswirelesschanged");
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_media_transitions_state() {
        let m = HeadlessMedia::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in ["play", "playing", "pause"] {
            let e = events.clone();
            m.add_event_listener(kind, Rc::new(move |ev: &MediaEvent| e.borrow_mut().push(ev.kind.clone())));
        }
        assert!(m.paused());
        m.play().unwrap();
        assert!(!m.paused());
        m.pause();
        assert!(m.paused());
        assert_eq!(*events.borrow(), vec!["play", "playing", "pause"]);
    }

    #[test]
    fn locked_volume_ignores_writes() {
        let m = HeadlessMedia::new();
        m.lock_volume(true);
        m.set_volume(0.2);
        assert_eq!(m.volume(), Some(1.0));
    }

    #[test]
    fn undefined_media_runs_callbacks_on_upgrade() {
        let m = HeadlessMedia::undefined("hls-video");
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        m.when_upgraded(Box::new(move || h.set(true)));
        assert!(!hit.get());
        m.upgrade();
        assert!(hit.get());
        assert!(m.is_upgraded());
    }

    #[test]
    fn pip_requires_metadata() {
        let m = HeadlessMedia::new();
        assert!(m.request_picture_in_picture().unwrap_err().is_not_ready());
    }
}
