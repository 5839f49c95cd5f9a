//! The state mediator: one facade entry per state key.
//!
//! Each [`FacadeProperty`] knows how to compute its value from the state
//! owners, optionally how to push a value back into them, which native
//! events invalidate it, and which side effects must be set up while the
//! owners are assigned.

mod availability;
mod fullscreen;
mod pip;
mod playback;
mod remote;
mod renditions;
pub mod subtitles;

pub use fullscreen::{enter_fullscreen, exit_fullscreen, has_fullscreen_support, is_fullscreen};
pub use subtitles::{showing_subtitle_tracks, subtitle_tracks, toggle_subtitle_tracks};
pub(crate) use playback::format_number;

use crate::owners::StateOwners;
use crate::platform::{Listener, MediaEvent};
use crate::state::{PartialState, StateKey, StateValue};

/// Computes a value from the owners, optionally informed by the event that
/// triggered the recomputation.
pub type Getter = fn(&StateOwners, Option<&MediaEvent>) -> StateValue;

/// Pushes a value into the owners.
pub type Setter = fn(&StateValue, &StateOwners);

/// Undoes whatever an update handler set up.
pub type Teardown = Box<dyn FnOnce()>;

/// Runs when owners change while monitoring is active. `push` re-evaluates
/// the property and hands the result to the store.
pub type UpdateHandler = fn(&Listener, &StateOwners) -> Option<Teardown>;

/// Objects whose events invalidate facade properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventSource {
    Media,
    TextTracks,
    VideoRenditions,
    AudioTracks,
    Remote,
    Root,
}

impl EventSource {
    pub const ALL: [EventSource; 6] = [
        EventSource::Media,
        EventSource::TextTracks,
        EventSource::VideoRenditions,
        EventSource::AudioTracks,
        EventSource::Remote,
        EventSource::Root,
    ];
}

#[derive(Clone, Copy)]
pub struct FacadeProperty {
    pub key: StateKey,
    pub get: Getter,
    pub set: Option<Setter>,
    pub media_events: &'static [&'static str],
    pub text_tracks_events: &'static [&'static str],
    pub video_renditions_events: &'static [&'static str],
    pub audio_tracks_events: &'static [&'static str],
    pub remote_events: &'static [&'static str],
    pub root_events: &'static [&'static str],
    pub update_handlers: &'static [UpdateHandler],
    /// Handlers that read options when their events fire. These re-run on
    /// options changes too; plain update handlers do not.
    pub option_handlers: &'static [UpdateHandler],
}

impl FacadeProperty {
    pub fn new(key: StateKey, get: Getter) -> Self {
        FacadeProperty {
            key,
            get,
            set: None,
            media_events: &[],
            text_tracks_events: &[],
            video_renditions_events: &[],
            audio_tracks_events: &[],
            remote_events: &[],
            root_events: &[],
            update_handlers: &[],
            option_handlers: &[],
        }
    }

    pub fn setter(mut self, set: Setter) -> Self {
        self.set = Some(set);
        self
    }

    pub fn media(mut self, events: &'static [&'static str]) -> Self {
        self.media_events = events;
        self
    }

    pub fn text_tracks(mut self, events: &'static [&'static str]) -> Self {
        self.text_tracks_events = events;
        self
    }

    pub fn video_renditions(mut self, events: &'static [&'static str]) -> Self {
        self.video_renditions_events = events;
        self
    }

    pub fn audio_tracks(mut self, events: &'static [&'static str]) -> Self {
        self.audio_tracks_events = events;
        self
    }

    pub fn remote(mut self, events: &'static [&'static str]) -> Self {
        self.remote_events = events;
        self
    }

    pub fn root(mut self, events: &'static [&'static str]) -> Self {
        self.root_events = events;
        self
    }

    pub fn handlers(mut self, handlers: &'static [UpdateHandler]) -> Self {
        self.update_handlers = handlers;
        self
    }

    pub fn option_handlers(mut self, handlers: &'static [UpdateHandler]) -> Self {
        self.option_handlers = handlers;
        self
    }

    pub fn events(&self, source: EventSource) -> &'static [&'static str] {
        match source {
            EventSource::Media => self.media_events,
            EventSource::TextTracks => self.text_tracks_events,
            EventSource::VideoRenditions => self.video_renditions_events,
            EventSource::AudioTracks => self.audio_tracks_events,
            EventSource::Remote => self.remote_events,
            EventSource::Root => self.root_events,
        }
    }
}

impl std::fmt::Debug for FacadeProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacadeProperty")
            .field("key", &self.key)
            .field("settable", &self.set.is_some())
            .field("media_events", &self.media_events)
            .field("root_events", &self.root_events)
            .field("update_handlers", &self.update_handlers.len())
            .field("option_handlers", &self.option_handlers.len())
            .finish()
    }
}

/// The table of facade properties a store evaluates.
#[derive(Debug, Clone)]
pub struct Facade {
    properties: Vec<FacadeProperty>,
}

impl Facade {
    /// A facade with no properties.
    pub fn empty() -> Self {
        Facade {
            properties: Vec::new(),
        }
    }

    /// Every standard media property.
    pub fn standard() -> Self {
        Facade {
            properties: standard_properties(),
        }
    }

    /// Add a property, replacing any existing entry for the same key.
    pub fn with(mut self, property: FacadeProperty) -> Self {
        match self.properties.iter_mut().find(|p| p.key == property.key) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    pub fn without(mut self, key: StateKey) -> Self {
        self.properties.retain(|p| p.key != key);
        self
    }

    pub fn properties(&self) -> &[FacadeProperty] {
        &self.properties
    }

    pub fn property(&self, key: StateKey) -> Option<&FacadeProperty> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn contains(&self, key: StateKey) -> bool {
        self.property(key).is_some()
    }

    /// Current value of `key`, `Unset` when the facade lacks it.
    pub fn get(&self, key: StateKey, owners: &StateOwners) -> StateValue {
        self.property(key)
            .map(|p| (p.get)(owners, None))
            .unwrap_or_default()
    }

    pub fn set(&self, key: StateKey, value: &StateValue, owners: &StateOwners) {
        match self.property(key).and_then(|p| p.set) {
            Some(set) => set(value, owners),
            None => log::debug!("facade property {key} is read-only"),
        }
    }

    /// Evaluate every property.
    pub fn evaluate(&self, owners: &StateOwners) -> PartialState {
        self.properties
            .iter()
            .map(|p| (p.key, (p.get)(owners, None)))
            .collect()
    }
}

impl Default for Facade {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_properties() -> Vec<FacadeProperty> {
    use StateKey::*;

    const ERROR_EVENTS: &[&str] = &["emptied", "error", "playing"];
    const MUTED_PREF: &[UpdateHandler] = &[playback::restore_muted_pref];
    const VOLUME_PREF: &[UpdateHandler] = &[playback::restore_volume_pref];
    const DEFAULT_SUBTITLES: &[UpdateHandler] = &[subtitles::apply_default_subtitles];
    const CHAPTERS_LOAD: &[UpdateHandler] = &[subtitles::watch_chapters_load];
    const VOLUME_PROBE: &[UpdateHandler] = &[availability::probe_volume_support];
    const REMOTE_WATCH: &[UpdateHandler] = &[remote::watch_availability];

    vec![
        FacadeProperty::new(MediaError, playback::error).media(ERROR_EVENTS),
        FacadeProperty::new(MediaErrorCode, playback::error_code).media(ERROR_EVENTS),
        FacadeProperty::new(MediaErrorMessage, playback::error_message).media(ERROR_EVENTS),
        FacadeProperty::new(MediaWidth, playback::width).media(&["resize"]),
        FacadeProperty::new(MediaHeight, playback::height).media(&["resize"]),
        FacadeProperty::new(MediaPaused, playback::paused)
            .setter(playback::set_paused)
            .media(&["play", "playing", "pause", "emptied"]),
        FacadeProperty::new(MediaHasPlayed, playback::has_played).media(&["playing", "emptied"]),
        FacadeProperty::new(MediaEnded, playback::ended).media(&["seeked", "ended", "emptied"]),
        FacadeProperty::new(MediaPlaybackRate, playback::playback_rate)
            .setter(playback::set_playback_rate)
            .media(&["ratechange", "loadstart"]),
        FacadeProperty::new(MediaMuted, playback::muted)
            .setter(playback::set_muted)
            .media(&["volumechange"])
            .handlers(MUTED_PREF),
        FacadeProperty::new(MediaVolume, playback::volume)
            .setter(playback::set_volume)
            .media(&["volumechange"])
            .handlers(VOLUME_PREF),
        FacadeProperty::new(MediaVolumeLevel, playback::volume_level).media(&["volumechange"]),
        FacadeProperty::new(MediaCurrentTime, playback::current_time)
            .setter(playback::set_current_time)
            .media(&["timeupdate", "loadedmetadata"]),
        FacadeProperty::new(MediaDuration, playback::duration)
            .media(&["durationchange", "loadedmetadata", "emptied"]),
        FacadeProperty::new(MediaLoading, playback::loading)
            .media(&["waiting", "playing", "emptied"]),
        FacadeProperty::new(MediaSeekable, playback::seekable)
            .media(&["loadedmetadata", "emptied", "progress", "seekablechange"]),
        FacadeProperty::new(MediaBuffered, playback::buffered).media(&["progress", "emptied"]),
        FacadeProperty::new(MediaStreamType, playback::stream_type)
            .media(&["emptied", "durationchange", "loadedmetadata", "streamtypechange"]),
        FacadeProperty::new(MediaTargetLiveWindow, playback::target_live_window).media(&[
            "emptied",
            "durationchange",
            "loadedmetadata",
            "streamtypechange",
            "targetlivewindowchange",
        ]),
        FacadeProperty::new(MediaTimeIsLive, playback::time_is_live)
            .media(&["playing", "timeupdate", "progress", "waiting", "emptied"]),
        FacadeProperty::new(MediaSubtitlesList, subtitles::subtitles_list)
            .media(&["loadstart"])
            .text_tracks(&["addtrack", "removetrack"]),
        FacadeProperty::new(MediaSubtitlesShowing, subtitles::subtitles_showing)
            .media(&["loadstart"])
            .text_tracks(&["addtrack", "removetrack", "change"])
            .option_handlers(DEFAULT_SUBTITLES),
        FacadeProperty::new(MediaChaptersCues, subtitles::chapters_cues)
            .media(&["loadstart", "loadedmetadata"])
            .text_tracks(&["addtrack", "removetrack", "change"])
            .handlers(CHAPTERS_LOAD),
        FacadeProperty::new(MediaIsPip, pip::is_pip)
            .setter(pip::set_pip)
            .media(&["enterpictureinpicture", "leavepictureinpicture"]),
        FacadeProperty::new(MediaRenditionList, renditions::rendition_list)
            .media(&["emptied", "loadstart"])
            .video_renditions(&["addrendition", "removerendition"]),
        FacadeProperty::new(MediaRenditionSelected, renditions::rendition_selected)
            .setter(renditions::select_rendition)
            .media(&["emptied"])
            .video_renditions(&["addrendition", "removerendition", "change"]),
        FacadeProperty::new(MediaAudioTrackList, renditions::audio_track_list)
            .media(&["emptied", "loadstart"])
            .audio_tracks(&["addtrack", "removetrack"]),
        FacadeProperty::new(MediaAudioTrackEnabled, renditions::audio_track_enabled)
            .setter(renditions::enable_audio_track)
            .media(&["emptied"])
            .audio_tracks(&["addtrack", "removetrack", "change"]),
        FacadeProperty::new(MediaIsFullscreen, fullscreen::fullscreen_state)
            .setter(fullscreen::set_fullscreen)
            .root(&["fullscreenchange", "webkitfullscreenchange"])
            .media(&[
                "webkitbeginfullscreen",
                "webkitendfullscreen",
                "webkitpresentationmodechanged",
            ]),
        FacadeProperty::new(MediaIsCasting, remote::is_casting)
            .setter(remote::set_casting)
            .remote(&["connect", "connecting", "disconnect"]),
        FacadeProperty::new(MediaIsAirplaying, remote::is_airplaying)
            .setter(remote::show_airplay_picker)
            .media(&["webkitcurrentplaybacktargetiswirelesschanged"]),
        FacadeProperty::new(MediaFullscreenUnavailable, availability::fullscreen_unavailable),
        FacadeProperty::new(MediaPipUnavailable, availability::pip_unavailable),
        FacadeProperty::new(MediaVolumeUnavailable, availability::volume_unavailable)
            .handlers(VOLUME_PROBE),
        FacadeProperty::new(MediaCastUnavailable, remote::cast_unavailable)
            .handlers(REMOTE_WATCH),
        FacadeProperty::new(MediaAirplayUnavailable, remote::airplay_unavailable)
            .media(&["webkitplaybacktargetavailabilitychanged"])
            .handlers(REMOTE_WATCH),
        FacadeProperty::new(MediaRenditionUnavailable, availability::rendition_unavailable)
            .media(&["emptied", "loadstart"])
            .video_renditions(&["addrendition", "removerendition"]),
        FacadeProperty::new(MediaAudioTrackUnavailable, availability::audio_track_unavailable)
            .media(&["emptied", "loadstart"])
            .audio_tracks(&["addtrack", "removetrack"]),
    ]
}

/// `toFixed(3)` followed by a numeric parse.
pub(crate) fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;
    use crate::owners::MediaHandle;
    use crate::platform::{MediaElement, Platform};
    use std::rc::Rc;

    fn owners_with(media: &Rc<HeadlessMedia>) -> StateOwners {
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        owners
    }

    #[test]
    fn standard_facade_covers_non_preview_keys() {
        let facade = Facade::standard();
        for key in StateKey::ALL {
            assert_eq!(facade.contains(*key), !key.is_preview(), "{key}");
        }
    }

    #[test]
    fn defaults_without_media() {
        let facade = Facade::standard();
        let owners = StateOwners::new(Rc::new(Platform::new()));
        assert_eq!(facade.get(StateKey::MediaPaused, &owners), StateValue::Bool(true));
        assert_eq!(facade.get(StateKey::MediaVolume, &owners), StateValue::Number(1.0));
        assert_eq!(facade.get(StateKey::MediaPlaybackRate, &owners), StateValue::Number(1.0));
        assert_eq!(facade.get(StateKey::MediaErrorMessage, &owners), StateValue::from(""));
        assert!(facade.get(StateKey::MediaDuration, &owners).as_number().is_some_and(f64::is_nan));
        assert_eq!(facade.get(StateKey::MediaVolumeLevel, &owners), StateValue::from("high"));
        assert_eq!(
            facade.get(StateKey::MediaVolumeUnavailable, &owners),
            StateValue::from("unsupported")
        );
    }

    #[test]
    fn paused_setter_drives_media() {
        let media = HeadlessMedia::new();
        let owners = owners_with(&media);
        let facade = Facade::standard();
        facade.set(StateKey::MediaPaused, &StateValue::Bool(false), &owners);
        assert!(!media.paused());
        facade.set(StateKey::MediaPaused, &StateValue::Bool(true), &owners);
        assert!(media.paused());
    }

    #[test]
    fn read_only_set_is_ignored() {
        let media = HeadlessMedia::new();
        let owners = owners_with(&media);
        let facade = Facade::standard();
        facade.set(StateKey::MediaEnded, &StateValue::Bool(true), &owners);
        assert!(!media.ended());
    }

    #[test]
    fn custom_property_replaces_entry() {
        fn always_live(_: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
            StateValue::from("live")
        }
        let facade =
            Facade::standard().with(FacadeProperty::new(StateKey::MediaStreamType, always_live));
        let owners = StateOwners::new(Rc::new(Platform::new()));
        assert_eq!(facade.get(StateKey::MediaStreamType, &owners), StateValue::from("live"));
        assert_eq!(facade.properties().len(), Facade::standard().properties().len());
    }

    #[test]
    fn rounding_matches_three_decimals() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(10.0), 10.0);
    }
}
