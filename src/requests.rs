//! Request handler table
//!
//! Translates intents dispatched by controls into facade writes. Each
//! handler may also return a partial state to merge straight into the
//! snapshot (only the preview request does).

use crate::captions::{parse_text_tracks, text_tracks_where, update_tracks_mode};
use crate::mediator::{subtitle_tracks, toggle_subtitle_tracks, Facade};
use crate::options::OptionsPatch;
use crate::owners::StateOwners;
use crate::platform::storage::PREF_SUBTITLES_LANG;
use crate::platform::{DocumentRoot, Element, MediaElement};
use crate::state::{PartialState, StateKey, StateValue, TextTrackInfo, TextTrackMode, TrackKind};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use url::Url;

macro_rules! request_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed vocabulary of intent types.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RequestType {
            $($variant),+
        }

        impl RequestType {
            pub const ALL: &'static [RequestType] = &[$(RequestType::$variant),+];

            /// Event name of the intent.
            pub fn name(&self) -> &'static str {
                match self {
                    $(RequestType::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<RequestType> {
                match name {
                    $($name => Some(RequestType::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

request_types! {
    Play => "mediaplayrequest",
    Pause => "mediapauserequest",
    Mute => "mediamuterequest",
    Unmute => "mediaunmuterequest",
    Volume => "mediavolumerequest",
    Seek => "mediaseekrequest",
    SeekToLive => "mediaseektoliverequest",
    PlaybackRate => "mediaplaybackraterequest",
    EnterFullscreen => "mediaenterfullscreenrequest",
    ExitFullscreen => "mediaexitfullscreenrequest",
    EnterPip => "mediaenterpiprequest",
    ExitPip => "mediaexitpiprequest",
    EnterCast => "mediaentercastrequest",
    ExitCast => "mediaexitcastrequest",
    Airplay => "mediaairplayrequest",
    ShowSubtitles => "mediashowsubtitlesrequest",
    DisableSubtitles => "mediadisablesubtitlesrequest",
    ToggleSubtitles => "mediatogglesubtitlesrequest",
    Rendition => "mediarenditionrequest",
    AudioTrack => "mediaaudiotrackrequest",
    Preview => "mediapreviewrequest",
    MediaElementChange => "mediaelementchangerequest",
    FullscreenElementChange => "fullscreenelementchangerequest",
    DocumentElementChange => "documentelementchangerequest",
    OptionsChange => "optionschangerequest",
}

impl RequestType {
    /// Intents that reassign state owners instead of touching the facade.
    pub fn is_reassignment(&self) -> bool {
        matches!(
            self,
            RequestType::MediaElementChange
                | RequestType::FullscreenElementChange
                | RequestType::DocumentElementChange
                | RequestType::OptionsChange
        )
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of an intent.
#[derive(Clone, Default)]
pub enum Detail {
    #[default]
    None,
    Bool(bool),
    Number(f64),
    Text(String),
    TextTracks(Vec<TextTrackInfo>),
    Media(Option<Rc<dyn MediaElement>>),
    Element(Option<Rc<dyn Element>>),
    Document(Option<Rc<dyn DocumentRoot>>),
    Options(OptionsPatch),
}

impl Detail {
    pub fn is_none(&self) -> bool {
        matches!(self, Detail::None)
    }

    /// Numeric payload; numeric text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Detail::Number(n) => Some(*n),
            Detail::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Detail::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Track selectors, either given directly or as an attribute string.
    pub fn text_tracks(&self) -> Vec<TextTrackInfo> {
        match self {
            Detail::TextTracks(tracks) => tracks.clone(),
            Detail::Text(s) => parse_text_tracks(s),
            _ => Vec::new(),
        }
    }

    pub fn to_value(&self) -> StateValue {
        match self {
            Detail::Bool(b) => StateValue::Bool(*b),
            Detail::Number(n) => StateValue::Number(*n),
            Detail::Text(s) => StateValue::Text(s.clone()),
            Detail::TextTracks(t) => StateValue::TextTracks(t.clone()),
            _ => StateValue::Unset,
        }
    }
}

impl fmt::Debug for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::None => f.write_str("None"),
            Detail::Bool(b) => write!(f, "Bool({b})"),
            Detail::Number(n) => write!(f, "Number({n})"),
            Detail::Text(s) => write!(f, "Text({s:?})"),
            Detail::TextTracks(t) => f.debug_tuple("TextTracks").field(t).finish(),
            Detail::Media(m) => write!(f, "Media({:?})", m.as_ref().map(|m| m.node_id())),
            Detail::Element(e) => write!(f, "Element({:?})", e.as_ref().map(|e| e.node_id())),
            Detail::Document(d) => write!(f, "Document({:?})", d.as_ref().map(|d| d.node_id())),
            Detail::Options(o) => f.debug_tuple("Options").field(o).finish(),
        }
    }
}

impl From<bool> for Detail {
    fn from(b: bool) -> Self {
        Detail::Bool(b)
    }
}

impl From<f64> for Detail {
    fn from(n: f64) -> Self {
        Detail::Number(n)
    }
}

impl From<&str> for Detail {
    fn from(s: &str) -> Self {
        Detail::Text(s.to_string())
    }
}

impl From<String> for Detail {
    fn from(s: String) -> Self {
        Detail::Text(s)
    }
}

impl From<Vec<TextTrackInfo>> for Detail {
    fn from(tracks: Vec<TextTrackInfo>) -> Self {
        Detail::TextTracks(tracks)
    }
}

impl From<OptionsPatch> for Detail {
    fn from(patch: OptionsPatch) -> Self {
        Detail::Options(patch)
    }
}

/// `{ type, detail }` dispatched to a store.
#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: String,
    pub detail: Detail,
}

impl Intent {
    pub fn new(kind: impl Into<String>) -> Self {
        Intent {
            kind: kind.into(),
            detail: Detail::None,
        }
    }

    pub fn with_detail(kind: impl Into<String>, detail: impl Into<Detail>) -> Self {
        Intent {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    pub fn request(request: RequestType) -> Self {
        Intent::new(request.name())
    }

    pub fn request_with(request: RequestType, detail: impl Into<Detail>) -> Self {
        Intent::with_detail(request.name(), detail)
    }

    pub fn request_type(&self) -> Option<RequestType> {
        RequestType::from_name(&self.kind)
    }

    pub fn play() -> Self {
        Intent::request(RequestType::Play)
    }

    pub fn pause() -> Self {
        Intent::request(RequestType::Pause)
    }

    pub fn seek(time: f64) -> Self {
        Intent::request_with(RequestType::Seek, time)
    }

    pub fn volume(volume: f64) -> Self {
        Intent::request_with(RequestType::Volume, volume)
    }

    pub fn preview(time: f64) -> Self {
        Intent::request_with(RequestType::Preview, time)
    }

    pub fn media_change(media: Option<Rc<dyn MediaElement>>) -> Self {
        Intent {
            kind: RequestType::MediaElementChange.name().into(),
            detail: Detail::Media(media),
        }
    }

    pub fn fullscreen_element_change(element: Option<Rc<dyn Element>>) -> Self {
        Intent {
            kind: RequestType::FullscreenElementChange.name().into(),
            detail: Detail::Element(element),
        }
    }

    pub fn document_change(document: Option<Rc<dyn DocumentRoot>>) -> Self {
        Intent {
            kind: RequestType::DocumentElementChange.name().into(),
            detail: Detail::Document(document),
        }
    }

    pub fn options_change(patch: OptionsPatch) -> Self {
        Intent::request_with(RequestType::OptionsChange, patch)
    }
}

/// A request handler. The returned partial state, if any, is merged into
/// the snapshot directly.
pub type RequestHandler = fn(&Facade, &StateOwners, &Detail) -> Option<PartialState>;

/// Maps intent types to handlers.
#[derive(Clone)]
pub struct RequestMap {
    handlers: HashMap<RequestType, RequestHandler>,
}

impl RequestMap {
    pub fn empty() -> Self {
        RequestMap {
            handlers: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        use RequestType::*;

        let table: [(RequestType, RequestHandler); 21] = [
            (Preview, preview),
            (Pause, pause),
            (Play, play),
            (PlaybackRate, playback_rate),
            (Mute, mute),
            (Unmute, unmute),
            (Volume, volume),
            (Seek, seek),
            (SeekToLive, seek_to_live),
            (ShowSubtitles, show_subtitles),
            (DisableSubtitles, disable_subtitles),
            (ToggleSubtitles, toggle_subtitles),
            (Rendition, rendition),
            (AudioTrack, audio_track),
            (EnterPip, enter_pip),
            (ExitPip, exit_pip),
            (EnterFullscreen, enter_fullscreen),
            (ExitFullscreen, exit_fullscreen),
            (EnterCast, enter_cast),
            (ExitCast, exit_cast),
            (Airplay, airplay),
        ];
        RequestMap {
            handlers: table.into_iter().collect(),
        }
    }

    pub fn with(mut self, request: RequestType, handler: RequestHandler) -> Self {
        self.handlers.insert(request, handler);
        self
    }

    pub fn without(mut self, request: RequestType) -> Self {
        self.handlers.remove(&request);
        self
    }

    pub fn get(&self, request: RequestType) -> Option<RequestHandler> {
        self.handlers.get(&request).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for RequestMap {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for RequestMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(|r| r.name()).collect();
        names.sort_unstable();
        f.debug_struct("RequestMap").field("handlers", &names).finish()
    }
}

fn pause(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaPaused, &StateValue::Bool(true), owners);
    None
}

/// Live streams without a DVR window jump to the live edge before playing.
fn play(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    let live = facade.get(StateKey::MediaStreamType, owners).as_text() == Some("live");
    let auto_seek = !owners.options.no_auto_seek_to_live;
    let dvr = facade
        .get(StateKey::MediaTargetLiveWindow, owners)
        .as_number()
        .is_some_and(|w| w > 0.0);
    if live && auto_seek && !dvr {
        if let Some((_, end)) = facade.get(StateKey::MediaSeekable, owners).as_range() {
            if end != 0.0 && !end.is_nan() {
                let target = end - owners.options.seek_to_live_offset();
                facade.set(StateKey::MediaCurrentTime, &StateValue::Number(target), owners);
            }
        }
    }
    facade.set(StateKey::MediaPaused, &StateValue::Bool(false), owners);
    None
}

fn playback_rate(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let rate = detail.as_number().map(StateValue::Number).unwrap_or_default();
    facade.set(StateKey::MediaPlaybackRate, &rate, owners);
    None
}

fn mute(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaMuted, &StateValue::Bool(true), owners);
    None
}

const UNMUTE_VOLUME_FLOOR: f64 = 0.25;

/// Unmuting never leaves the media silent.
fn unmute(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    if !facade.get(StateKey::MediaVolume, owners).is_truthy() {
        facade.set(
            StateKey::MediaVolume,
            &StateValue::Number(UNMUTE_VOLUME_FLOOR),
            owners,
        );
    }
    facade.set(StateKey::MediaMuted, &StateValue::Bool(false), owners);
    None
}

fn volume(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let requested = detail.as_number();
    let audible = requested.is_some_and(|v| v != 0.0 && !v.is_nan());
    if audible && facade.get(StateKey::MediaMuted, owners).is_truthy() {
        facade.set(StateKey::MediaMuted, &StateValue::Bool(false), owners);
    }
    let value = requested.map(StateValue::Number).unwrap_or_default();
    facade.set(StateKey::MediaVolume, &value, owners);
    None
}

fn seek(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let time = detail.as_number().map(StateValue::Number).unwrap_or_default();
    facade.set(StateKey::MediaCurrentTime, &time, owners);
    None
}

fn seek_to_live(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    let (_, end) = facade.get(StateKey::MediaSeekable, owners).as_range()?;
    if end.is_nan() {
        return None;
    }
    let target = end - owners.options.seek_to_live_offset();
    facade.set(StateKey::MediaCurrentTime, &StateValue::Number(target), owners);
    None
}

fn show_subtitles(_: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let tracks = subtitle_tracks(owners);
    let selectors = detail.text_tracks();
    let language = selectors.first().map(|t| t.language.as_str()).unwrap_or("");
    if !language.is_empty() && !owners.options.no_subtitles_lang_pref {
        if let Err(err) = owners
            .platform
            .storage()
            .set_item(PREF_SUBTITLES_LANG, language)
        {
            log::debug!("error setting subtitles language pref: {err}");
        }
    }
    update_tracks_mode(TextTrackMode::Showing, &tracks, &selectors);
    None
}

fn disable_subtitles(_: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let tracks = subtitle_tracks(owners);
    update_tracks_mode(TextTrackMode::Disabled, &tracks, &detail.text_tracks());
    None
}

fn toggle_subtitles(_: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    toggle_subtitle_tracks(owners, detail.as_bool());
    None
}

fn rendition(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaRenditionSelected, &detail.to_value(), owners);
    None
}

fn audio_track(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaAudioTrackEnabled, &detail.to_value(), owners);
    None
}

/// Turn off each of `keys` that is currently on.
fn exit_active(facade: &Facade, owners: &StateOwners, keys: &[StateKey]) {
    for key in keys {
        if facade.get(*key, owners).is_truthy() {
            facade.set(*key, &StateValue::Bool(false), owners);
        }
    }
}

fn enter_pip(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    exit_active(facade, owners, &[StateKey::MediaIsFullscreen, StateKey::MediaIsCasting]);
    facade.set(StateKey::MediaIsPip, &StateValue::Bool(true), owners);
    None
}

fn exit_pip(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaIsPip, &StateValue::Bool(false), owners);
    None
}

fn enter_fullscreen(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    exit_active(facade, owners, &[StateKey::MediaIsPip, StateKey::MediaIsCasting]);
    facade.set(StateKey::MediaIsFullscreen, &StateValue::Bool(true), owners);
    None
}

fn exit_fullscreen(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaIsFullscreen, &StateValue::Bool(false), owners);
    None
}

fn enter_cast(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    exit_active(facade, owners, &[StateKey::MediaIsFullscreen, StateKey::MediaIsPip]);
    facade.set(StateKey::MediaIsCasting, &StateValue::Bool(true), owners);
    None
}

fn exit_cast(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaIsCasting, &StateValue::Bool(false), owners);
    None
}

fn airplay(facade: &Facade, owners: &StateOwners, _: &Detail) -> Option<PartialState> {
    facade.set(StateKey::MediaIsAirplaying, &StateValue::Bool(true), owners);
    None
}

/// Resolve a thumbnail cue payload against the track source and split off
/// the `#xywh=` fragment.
fn resolve_thumbnail(payload: &str, track_src: Option<String>) -> Option<(String, Vec<f64>)> {
    let url = match Url::parse(payload) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&track_src?).ok()?;
            base.join(payload).ok()?
        }
        Err(err) => {
            log::debug!("invalid thumbnail cue {payload:?}: {err}");
            return None;
        }
    };
    let fragment = url.fragment()?;
    let (_, xywh) = url::form_urlencoded::parse(fragment.as_bytes()).find(|(k, _)| k == "xywh")?;
    let coords = xywh
        .split(',')
        .map(|n| n.trim().parse::<f64>().unwrap_or(f64::NAN))
        .collect();
    Some((url.to_string(), coords))
}

/// Thumbnail and chapter for a timeline position.
///
/// The first thumbnail cue also covers times before it and the last covers
/// times after it. The last chapter is inclusive of its end when it ends at
/// the media duration. A position with no chapter yields `""`.
fn preview(facade: &Facade, owners: &StateOwners, detail: &Detail) -> Option<PartialState> {
    let time = detail.as_number();
    let mut image = StateValue::Unset;
    let mut coords = StateValue::Unset;

    if let (Some(media), Some(t)) = (&owners.media, time) {
        let thumbnails = text_tracks_where(&**media, |track| {
            track.kind() == TrackKind::Metadata && track.label() == "thumbnails"
        });
        if let Some(track) = thumbnails.first() {
            let cues = track.cues();
            let last = cues.len().saturating_sub(1);
            let cue = cues.iter().enumerate().find(|(i, cue)| {
                if *i == 0 {
                    cue.end_time > t
                } else if *i == last {
                    cue.start_time <= t
                } else {
                    cue.start_time <= t && cue.end_time > t
                }
            });
            if let Some((_, cue)) = cue {
                if let Some((href, xywh)) = resolve_thumbnail(&cue.text, track.src()) {
                    image = StateValue::Text(href);
                    coords = StateValue::Coords(xywh);
                }
            }
        }
    }

    let duration = facade
        .get(StateKey::MediaDuration, owners)
        .as_number()
        .unwrap_or(f64::NAN);
    let chapters = facade.get(StateKey::MediaChaptersCues, owners);
    let mut chapter = time.and_then(|t| {
        let cues = chapters.as_cues().unwrap_or_default();
        let last = cues.len().saturating_sub(1);
        cues.iter()
            .enumerate()
            .find(|(i, cue)| {
                if *i == last && cue.end_time == duration {
                    cue.start_time <= t && cue.end_time >= t
                } else {
                    cue.start_time <= t && cue.end_time > t
                }
            })
            .map(|(_, cue)| StateValue::Text(cue.text.clone()))
    });
    if !detail.is_none() && chapter.is_none() {
        chapter = Some(StateValue::Text(String::new()));
    }

    let mut partial = PartialState::new();
    partial.insert(
        StateKey::MediaPreviewTime,
        time.map(StateValue::Number).unwrap_or_default(),
    );
    partial.insert(StateKey::MediaPreviewImage, image);
    partial.insert(StateKey::MediaPreviewCoords, coords);
    partial.insert(StateKey::MediaPreviewChapter, chapter.unwrap_or_default());
    Some(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessMedia, HeadlessTextTrack};
    use crate::owners::MediaHandle;
    use crate::platform::Platform;
    use crate::state::Cue;

    fn owners(media: &Rc<HeadlessMedia>) -> StateOwners {
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        owners
    }

    fn run(request: RequestType, owners: &StateOwners, detail: Detail) -> Option<PartialState> {
        let handler = RequestMap::standard().get(request).unwrap();
        handler(&Facade::standard(), owners, &detail)
    }

    #[test]
    fn names_round_trip() {
        for r in RequestType::ALL {
            assert_eq!(RequestType::from_name(r.name()), Some(*r));
        }
        assert_eq!(RequestType::from_name("mediaplay"), None);
        assert!(RequestType::OptionsChange.is_reassignment());
        assert!(!RequestType::Play.is_reassignment());
    }

    #[test]
    fn standard_map_has_no_reassignment_handlers() {
        let map = RequestMap::standard();
        for r in RequestType::ALL {
            assert_eq!(map.get(*r).is_some(), !r.is_reassignment(), "{r}");
        }
    }

    #[test]
    fn unmute_raises_zero_volume() {
        let media = HeadlessMedia::new();
        media.set_volume(0.0);
        media.set_muted(true);
        let o = owners(&media);
        run(RequestType::Unmute, &o, Detail::None);
        assert!(!media.muted());
        assert_eq!(media.volume(), Some(0.25));
    }

    #[test]
    fn audible_volume_unmutes() {
        let media = HeadlessMedia::new();
        media.set_muted(true);
        let o = owners(&media);
        run(RequestType::Volume, &o, Detail::Number(0.0));
        assert!(media.muted());
        run(RequestType::Volume, &o, Detail::Number(0.6));
        assert!(!media.muted());
        assert_eq!(media.volume(), Some(0.6));
    }

    #[test]
    fn play_seeks_live_streams_to_edge() {
        let media = HeadlessMedia::new();
        media.set_duration(f64::INFINITY);
        media.set_seekable(Some(vec![(0.0, 120.0)]));
        let mut o = owners(&media);
        o.options.seek_to_live_offset = Some(5.0);
        run(RequestType::Play, &o, Detail::None);
        assert_eq!(media.current_time(), 115.0);
        assert!(!media.paused());
    }

    #[test]
    fn dvr_window_disables_auto_seek() {
        let media = HeadlessMedia::new();
        media.set_duration(f64::INFINITY);
        media.set_seekable(Some(vec![(0.0, 120.0)]));
        media.set_target_live_window(Some(60.0));
        let o = owners(&media);
        run(RequestType::Play, &o, Detail::None);
        assert_eq!(media.current_time(), 0.0);
    }

    #[test]
    fn seek_to_live_without_seekable_is_ignored() {
        let media = HeadlessMedia::new();
        media.tick(12.0);
        let o = owners(&media);
        run(RequestType::SeekToLive, &o, Detail::None);
        assert_eq!(media.current_time(), 12.0);
    }

    #[test]
    fn show_then_disable_subtitles() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add_track(TrackKind::Subtitles, "en", "English");
        let o = owners(&media);
        run(RequestType::ShowSubtitles, &o, Detail::from("en:English"));
        assert_eq!(crate::mediator::showing_subtitle_tracks(&o).len(), 1);
        let stored = o.platform.storage().get_item(PREF_SUBTITLES_LANG).unwrap();
        assert_eq!(stored.as_deref(), Some("en"));
        run(RequestType::DisableSubtitles, &o, Detail::from("en:English"));
        assert!(crate::mediator::showing_subtitle_tracks(&o).is_empty());
    }

    fn with_chapters(media: &Rc<HeadlessMedia>) {
        let list = media.text_track_list().unwrap();
        list.add(HeadlessTextTrack::new(TrackKind::Chapters, "en", "").with_cues(vec![
            Cue::new(0.0, 10.0, "Intro"),
            Cue::new(10.0, 20.0, "Body"),
        ]));
        media.load_metadata(20.0);
    }

    fn chapter_at(o: &StateOwners, t: f64) -> StateValue {
        let partial = run(RequestType::Preview, o, Detail::Number(t)).unwrap();
        partial[&StateKey::MediaPreviewChapter].clone()
    }

    #[test]
    fn last_chapter_includes_duration() {
        let media = HeadlessMedia::new();
        with_chapters(&media);
        let o = owners(&media);
        assert_eq!(chapter_at(&o, 5.0), StateValue::from("Intro"));
        assert_eq!(chapter_at(&o, 10.0), StateValue::from("Body"));
        assert_eq!(chapter_at(&o, 20.0), StateValue::from("Body"));
        assert_eq!(chapter_at(&o, 25.0), StateValue::from(""));
    }

    #[test]
    fn preview_without_detail_leaves_chapter_unset() {
        let media = HeadlessMedia::new();
        with_chapters(&media);
        let o = owners(&media);
        let partial = run(RequestType::Preview, &o, Detail::None).unwrap();
        assert!(partial[&StateKey::MediaPreviewChapter].is_unset());
        assert!(partial[&StateKey::MediaPreviewTime].is_unset());
    }

    #[test]
    fn thumbnail_cue_resolves_against_track_src() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add(
            HeadlessTextTrack::new(TrackKind::Metadata, "", "thumbnails")
                .with_src("https://cdn.example.com/vod/thumbs.vtt")
                .with_cues(vec![
                    Cue::new(0.0, 5.0, "sprite.jpg#xywh=0,0,160,90"),
                    Cue::new(5.0, 10.0, "sprite.jpg#xywh=160,0,160,90"),
                    Cue::new(10.0, 15.0, "https://img.example.com/last.jpg#xywh=0,90,160,90"),
                ]),
        );
        let o = owners(&media);
        let partial = run(RequestType::Preview, &o, Detail::Number(6.0)).unwrap();
        assert_eq!(
            partial[&StateKey::MediaPreviewImage],
            StateValue::from("https://cdn.example.com/vod/sprite.jpg#xywh=160,0,160,90")
        );
        assert_eq!(
            partial[&StateKey::MediaPreviewCoords],
            StateValue::Coords(vec![160.0, 0.0, 160.0, 90.0])
        );
        let past_end = run(RequestType::Preview, &o, Detail::Number(99.0)).unwrap();
        assert_eq!(
            past_end[&StateKey::MediaPreviewImage],
            StateValue::from("https://img.example.com/last.jpg#xywh=0,90,160,90")
        );
    }
}
