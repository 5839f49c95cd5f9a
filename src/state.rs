//! State keys, values and the frozen [`MediaState`] snapshot.
//!
//! Every observable piece of playback state has a [`StateKey`]. The store
//! rebuilds a [`MediaState`] whenever a key changes; snapshots are shared
//! behind an `Rc` and never mutated in place.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

macro_rules! state_keys {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed set of state keys tracked by the store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum StateKey {
            $($variant),+
        }

        impl StateKey {
            /// Every key, in declaration order.
            pub const ALL: &'static [StateKey] = &[$(StateKey::$variant),+];

            /// camelCase name, also the property name on receivers.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(StateKey::$variant => $name),+
                }
            }

            /// Look a key up by its camelCase name.
            pub fn from_name(name: &str) -> Option<StateKey> {
                match name {
                    $($name => Some(StateKey::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

state_keys! {
    MediaError => "mediaError",
    MediaErrorCode => "mediaErrorCode",
    MediaErrorMessage => "mediaErrorMessage",
    MediaWidth => "mediaWidth",
    MediaHeight => "mediaHeight",
    MediaPaused => "mediaPaused",
    MediaHasPlayed => "mediaHasPlayed",
    MediaEnded => "mediaEnded",
    MediaPlaybackRate => "mediaPlaybackRate",
    MediaMuted => "mediaMuted",
    MediaVolume => "mediaVolume",
    MediaVolumeLevel => "mediaVolumeLevel",
    MediaCurrentTime => "mediaCurrentTime",
    MediaDuration => "mediaDuration",
    MediaLoading => "mediaLoading",
    MediaSeekable => "mediaSeekable",
    MediaBuffered => "mediaBuffered",
    MediaStreamType => "mediaStreamType",
    MediaTargetLiveWindow => "mediaTargetLiveWindow",
    MediaTimeIsLive => "mediaTimeIsLive",
    MediaSubtitlesList => "mediaSubtitlesList",
    MediaSubtitlesShowing => "mediaSubtitlesShowing",
    MediaChaptersCues => "mediaChaptersCues",
    MediaIsPip => "mediaIsPip",
    MediaRenditionList => "mediaRenditionList",
    MediaRenditionSelected => "mediaRenditionSelected",
    MediaAudioTrackList => "mediaAudioTrackList",
    MediaAudioTrackEnabled => "mediaAudioTrackEnabled",
    MediaIsFullscreen => "mediaIsFullscreen",
    MediaIsCasting => "mediaIsCasting",
    MediaIsAirplaying => "mediaIsAirplaying",
    MediaFullscreenUnavailable => "mediaFullscreenUnavailable",
    MediaPipUnavailable => "mediaPipUnavailable",
    MediaVolumeUnavailable => "mediaVolumeUnavailable",
    MediaCastUnavailable => "mediaCastUnavailable",
    MediaAirplayUnavailable => "mediaAirplayUnavailable",
    MediaRenditionUnavailable => "mediaRenditionUnavailable",
    MediaAudioTrackUnavailable => "mediaAudioTrackUnavailable",
    MediaPreviewTime => "mediaPreviewTime",
    MediaPreviewImage => "mediaPreviewImage",
    MediaPreviewCoords => "mediaPreviewCoords",
    MediaPreviewChapter => "mediaPreviewChapter",
}

impl StateKey {
    /// Lowercase attribute name used when propagating to DOM receivers.
    pub fn attribute_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Name of the event dispatched on the controller when this key changes.
    pub fn change_event(&self) -> String {
        change_event_for_attribute(&self.attribute_name())
    }

    /// Look a key up by its lowercase attribute name.
    pub fn from_attribute(attr: &str) -> Option<StateKey> {
        StateKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(attr))
    }

    /// Keys that only ever come from a preview request.
    pub fn is_preview(&self) -> bool {
        matches!(
            self,
            StateKey::MediaPreviewTime
                | StateKey::MediaPreviewImage
                | StateKey::MediaPreviewCoords
                | StateKey::MediaPreviewChapter
        )
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Change event for a lowercase attribute name.
///
/// The container's `userinactive` flag is not a store key but shares the
/// controller's change channel.
pub fn change_event_for_attribute(attr: &str) -> String {
    match attr {
        USER_INACTIVE_ATTR => USER_INACTIVE_CHANGE.to_string(),
        other => format!("{other}change"),
    }
}

pub const USER_INACTIVE_ATTR: &str = "userinactive";
pub const USER_INACTIVE_CHANGE: &str = "userinactivechange";

/// Result of an availability probe. Absence of a value means "available".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unavailable,
    Unsupported,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unavailable => "unavailable",
            Availability::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Live,
    OnDemand,
    Unknown,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Live => "live",
            StreamType::OnDemand => "on-demand",
            StreamType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<StreamType> {
        match s {
            "live" => Some(StreamType::Live),
            "on-demand" => Some(StreamType::OnDemand),
            "unknown" => Some(StreamType::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    Off,
    Low,
    Medium,
    High,
}

impl VolumeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeLevel::Off => "off",
            VolumeLevel::Low => "low",
            VolumeLevel::Medium => "medium",
            VolumeLevel::High => "high",
        }
    }

    /// Bucket a volume: muted or zero is off, then 0.5 and 0.75 thresholds.
    pub fn classify(volume: f64, muted: bool) -> VolumeLevel {
        if muted || volume == 0.0 {
            VolumeLevel::Off
        } else if volume < 0.5 {
            VolumeLevel::Low
        } else if volume < 0.75 {
            VolumeLevel::Medium
        } else {
            VolumeLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Subtitles,
    Captions,
    Chapters,
    Metadata,
    Descriptions,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Subtitles => "subtitles",
            TrackKind::Captions => "captions",
            TrackKind::Chapters => "chapters",
            TrackKind::Metadata => "metadata",
            TrackKind::Descriptions => "descriptions",
        }
    }

    pub fn parse(s: &str) -> Option<TrackKind> {
        match s {
            "subtitles" => Some(TrackKind::Subtitles),
            "captions" => Some(TrackKind::Captions),
            "chapters" => Some(TrackKind::Chapters),
            "metadata" => Some(TrackKind::Metadata),
            "descriptions" => Some(TrackKind::Descriptions),
            _ => None,
        }
    }

    /// Subtitles and captions are the kinds the subtitle keys care about.
    pub fn is_subtitle_like(&self) -> bool {
        matches!(self, TrackKind::Subtitles | TrackKind::Captions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTrackMode {
    Disabled,
    Hidden,
    Showing,
}

/// `{kind, language, label}` triple identifying a subtitle or caption track.
///
/// Tracks are matched by value, never by identity. An absent label is the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextTrackInfo {
    pub kind: TrackKind,
    pub language: String,
    pub label: String,
}

impl TextTrackInfo {
    pub fn new(kind: TrackKind, language: impl Into<String>, label: impl Into<String>) -> Self {
        TextTrackInfo {
            kind,
            language: language.into(),
            label: label.into(),
        }
    }
}

/// A timed text cue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Cue {
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// One selectable video quality variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioTrackInfo {
    pub id: String,
    pub kind: String,
    pub language: String,
    pub label: String,
    pub enabled: bool,
}

/// Fatal media error as reported by the media element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaErrorInfo {
    pub code: u16,
    pub message: String,
}

/// A single state value.
///
/// Equality treats `NaN` as equal to `NaN` so that a recomputed snapshot
/// holding an unknown duration compares equal to the previous one.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    #[default]
    Unset,
    Bool(bool),
    Number(f64),
    Text(String),
    Range(f64, f64),
    Ranges(Vec<(f64, f64)>),
    Coords(Vec<f64>),
    TextTracks(Vec<TextTrackInfo>),
    Cues(Vec<Cue>),
    Renditions(Vec<Rendition>),
    AudioTracks(Vec<AudioTrackInfo>),
    Error(MediaErrorInfo),
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn same_cue(a: &Cue, b: &Cue) -> bool {
    same_number(a.start_time, b.start_time) && same_number(a.end_time, b.end_time) && a.text == b.text
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        use StateValue::*;
        match (self, other) {
            (Unset, Unset) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => same_number(*a, *b),
            (Text(a), Text(b)) => a == b,
            (Range(a0, a1), Range(b0, b1)) => same_number(*a0, *b0) && same_number(*a1, *b1),
            (Ranges(a), Ranges(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(x, y)| same_number(x.0, y.0) && same_number(x.1, y.1))
            }
            (Coords(a), Coords(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_number(*x, *y))
            }
            (TextTracks(a), TextTracks(b)) => a == b,
            (Cues(a), Cues(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_cue(x, y)),
            (Renditions(a), Renditions(b)) => a == b,
            (AudioTracks(a), AudioTracks(b)) => a == b,
            (Error(a), Error(b)) => a == b,
            _ => false,
        }
    }
}

impl StateValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, StateValue::Unset)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JS-style truthiness, used where a flag may be absent.
    pub fn is_truthy(&self) -> bool {
        match self {
            StateValue::Unset => false,
            StateValue::Bool(b) => *b,
            StateValue::Number(n) => *n != 0.0 && !n.is_nan(),
            StateValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<(f64, f64)> {
        match self {
            StateValue::Range(a, b) => Some((*a, *b)),
            _ => None,
        }
    }

    pub fn as_text_tracks(&self) -> Option<&[TextTrackInfo]> {
        match self {
            StateValue::TextTracks(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_cues(&self) -> Option<&[Cue]> {
        match self {
            StateValue::Cues(c) => Some(c),
            _ => None,
        }
    }

    /// An empty list, as opposed to an absent value.
    pub fn is_empty_list(&self) -> bool {
        match self {
            StateValue::Ranges(v) => v.is_empty(),
            StateValue::Coords(v) => v.is_empty(),
            StateValue::TextTracks(v) => v.is_empty(),
            StateValue::Cues(v) => v.is_empty(),
            StateValue::Renditions(v) => v.is_empty(),
            StateValue::AudioTracks(v) => v.is_empty(),
            _ => false,
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        StateValue::Number(n)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Text(s)
    }
}

impl From<Option<Availability>> for StateValue {
    fn from(a: Option<Availability>) -> Self {
        match a {
            Some(a) => StateValue::Text(a.as_str().to_string()),
            None => StateValue::Unset,
        }
    }
}

impl From<StreamType> for StateValue {
    fn from(s: StreamType) -> Self {
        StateValue::Text(s.as_str().to_string())
    }
}

impl From<VolumeLevel> for StateValue {
    fn from(v: VolumeLevel) -> Self {
        StateValue::Text(v.as_str().to_string())
    }
}

/// A set of keys to merge into the next snapshot.
pub type PartialState = BTreeMap<StateKey, StateValue>;

static UNSET: StateValue = StateValue::Unset;

/// Immutable point-in-time view of all derived state.
///
/// Cloning is cheap; the map is shared.
#[derive(Debug, Clone, Default)]
pub struct MediaState {
    values: Rc<BTreeMap<StateKey, StateValue>>,
}

impl MediaState {
    pub fn from_map(values: BTreeMap<StateKey, StateValue>) -> Self {
        MediaState {
            values: Rc::new(values),
        }
    }

    /// Value for `key`; missing keys read as [`StateValue::Unset`].
    pub fn get(&self, key: StateKey) -> &StateValue {
        self.values.get(&key).unwrap_or(&UNSET)
    }

    pub fn contains(&self, key: StateKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &StateValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when applying `partial` would change at least one key.
    pub fn differs(&self, partial: &PartialState) -> bool {
        partial
            .iter()
            .any(|(k, v)| !self.values.get(k).is_some_and(|cur| cur == v))
    }

    /// New snapshot with `partial` merged over this one.
    pub fn merged(&self, partial: &PartialState) -> MediaState {
        let mut next = (*self.values).clone();
        for (k, v) in partial {
            next.insert(*k, v.clone());
        }
        MediaState::from_map(next)
    }

    pub fn ptr_eq(&self, other: &MediaState) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }

    pub fn paused(&self) -> bool {
        self.get(StateKey::MediaPaused).as_bool().unwrap_or(true)
    }

    pub fn muted(&self) -> bool {
        self.get(StateKey::MediaMuted).as_bool().unwrap_or(false)
    }

    pub fn volume(&self) -> f64 {
        self.get(StateKey::MediaVolume).as_number().unwrap_or(1.0)
    }

    pub fn current_time(&self) -> f64 {
        self.get(StateKey::MediaCurrentTime).as_number().unwrap_or(0.0)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.get(StateKey::MediaIsFullscreen).is_truthy()
    }

    pub fn is_pip(&self) -> bool {
        self.get(StateKey::MediaIsPip).is_truthy()
    }

    pub fn subtitles_showing(&self) -> &[TextTrackInfo] {
        self.get(StateKey::MediaSubtitlesShowing)
            .as_text_tracks()
            .unwrap_or(&[])
    }

    /// True while a fatal media error is recorded.
    pub fn has_error(&self) -> bool {
        !self.get(StateKey::MediaErrorCode).is_unset()
    }
}

impl PartialEq for MediaState {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.values == other.values
    }
}

impl Serialize for MediaState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in self.values.iter() {
            map.serialize_entry(k.as_str(), v)?;
        }
        map.end()
    }
}
