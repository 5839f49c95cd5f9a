//! UI controls
//!
//! Each control is a single concrete element type assembled from small
//! behaviour traits:
//!
//! * [`Control`]: reads propagated state attributes and dispatches requests
//! * [`Activatable`]: what a click does
//! * [`KeyboardActivatable`]: Enter / Space activation with keydown arming
//! * [`Toggle`]: flips between two requests based on one state attribute
//! * [`TooltipHost`]: the label a tooltip would show
//!
//! Controls never touch the media. They learn state through the attributes
//! the propagator writes and ask for changes with bubbling request events.

use crate::dom::{Document, DomElement, DomEvent, ElementDefinition, EventDetail};
use crate::error::{Error, Result};
use crate::platform::NodeId;
use crate::requests::{Detail, RequestType};
use crate::state::StateKey;
use std::cell::Cell;
use std::rc::Rc;

/// Default step of the seek buttons, in seconds.
pub const DEFAULT_SEEK_BUTTON_OFFSET: f64 = 30.0;

const DISABLED: &str = "disabled";
const SEEK_OFFSET: &str = "seekoffset";

/// Element plumbing shared by every control.
pub struct ControlCore {
    element: DomElement,
    armed: Cell<bool>,
}

impl ControlCore {
    /// Define `tag` if needed (observing `keys`) and create a detached element.
    pub fn create(document: &Rc<Document>, tag: &str, role: &str, keys: &[StateKey]) -> Result<Self> {
        if !document.is_defined(tag) {
            document.define(
                tag,
                ElementDefinition::new().observe(keys.iter().map(|k| k.attribute_name())),
            )?;
        }
        let id = document.create_element(tag);
        let element = document
            .element(id)
            .ok_or_else(|| Error::InvalidState(format!("{tag} was not created")))?;
        element.set_attribute("role", role);
        Ok(ControlCore {
            element,
            armed: Cell::new(false),
        })
    }
}

pub trait Control {
    fn core(&self) -> &ControlCore;

    fn element(&self) -> &DomElement {
        &self.core().element
    }

    fn id(&self) -> NodeId {
        self.element().id()
    }

    fn state_attribute(&self, key: StateKey) -> Option<String> {
        self.element().attribute(&key.attribute_name())
    }

    fn has_state(&self, key: StateKey) -> bool {
        self.state_attribute(key).is_some()
    }

    fn number_state(&self, key: StateKey) -> Option<f64> {
        self.state_attribute(key)?.trim().parse().ok()
    }

    fn disabled(&self) -> bool {
        self.element().attribute(DISABLED).is_some()
    }

    fn set_disabled(&self, disabled: bool) {
        if disabled {
            self.element().set_attribute(DISABLED, "");
        } else {
            self.element().remove_attribute(DISABLED);
        }
    }

    /// Dispatch a bubbling, composed request from this control.
    fn request(&self, request: RequestType, detail: Detail) {
        log::trace!("{} requests {request}", self.element().id().raw());
        let event = DomEvent::bubbling(request.name(), self.id())
            .with_detail(EventDetail::Request(detail));
        self.element().dispatch(event);
    }
}

pub trait Activatable: Control {
    fn activate(&self);

    /// Simulate a pointer click.
    fn click(&self) {
        self.element().dispatch(DomEvent::bubbling("click", self.id()));
    }
}

pub trait KeyboardActivatable: Activatable {
    fn keys_used(&self) -> &'static [&'static str] {
        &["Enter", " "]
    }

    fn key_down(&self, event: &DomEvent) {
        let EventDetail::Key(press) = &event.detail else {
            return;
        };
        let armed = !press.meta && !press.alt && self.keys_used().contains(&press.key.as_str());
        self.core().armed.set(armed);
    }

    fn key_up(&self, event: &DomEvent) {
        if !self.core().armed.replace(false) {
            return;
        }
        let EventDetail::Key(press) = &event.detail else {
            return;
        };
        if self.keys_used().contains(&press.key.as_str()) && !self.disabled() {
            self.activate();
        }
    }
}

pub trait Toggle: Control {
    /// Attribute that marks the "set" side of the toggle.
    const STATE: StateKey;
    /// Requested when the state attribute is present.
    const WHEN_SET: RequestType;
    /// Requested when it is absent.
    const WHEN_UNSET: RequestType;

    fn is_on(&self) -> bool {
        self.has_state(Self::STATE)
    }

    fn toggle(&self) {
        let request = if self.is_on() {
            Self::WHEN_SET
        } else {
            Self::WHEN_UNSET
        };
        self.request(request, Detail::None);
    }
}

pub trait TooltipHost: Control {
    fn tooltip(&self) -> String;
}

/// Hook up click and key handling for an activatable control.
fn install<C: KeyboardActivatable + 'static>(control: &Rc<C>) {
    let element = control.element().clone();
    element.set_attribute(
        "keysused",
        &control
            .keys_used()
            .iter()
            .map(|k| if *k == " " { "Space" } else { k })
            .collect::<Vec<_>>()
            .join(" "),
    );

    let weak = Rc::downgrade(control);
    element.add_listener(
        "click",
        Rc::new(move |_: &DomEvent| {
            if let Some(c) = weak.upgrade() {
                if !c.disabled() {
                    c.activate();
                }
            }
        }),
    );
    let weak = Rc::downgrade(control);
    element.add_listener(
        "keydown",
        Rc::new(move |event: &DomEvent| {
            if let Some(c) = weak.upgrade() {
                c.key_down(event);
            }
        }),
    );
    let weak = Rc::downgrade(control);
    element.add_listener(
        "keyup",
        Rc::new(move |event: &DomEvent| {
            if let Some(c) = weak.upgrade() {
                c.key_up(event);
            }
        }),
    );
}

macro_rules! toggle_button {
    (
        $(#[$meta:meta])*
        $name:ident, $tag:literal,
        state: $state:ident => $when_set:ident / $set_label:literal,
        otherwise: $when_unset:ident / $unset_label:literal,
        observes: [$($extra:ident),*]
    ) => {
        $(#[$meta])*
        pub struct $name {
            core: ControlCore,
        }

        impl $name {
            pub const TAG: &'static str = $tag;

            pub fn create(document: &Rc<Document>) -> Result<Rc<Self>> {
                let core = ControlCore::create(
                    document,
                    $tag,
                    "button",
                    &[StateKey::$state $(, StateKey::$extra)*],
                )?;
                let control = Rc::new($name { core });
                install(&control);
                Ok(control)
            }
        }

        impl Control for $name {
            fn core(&self) -> &ControlCore {
                &self.core
            }
        }

        impl Toggle for $name {
            const STATE: StateKey = StateKey::$state;
            const WHEN_SET: RequestType = RequestType::$when_set;
            const WHEN_UNSET: RequestType = RequestType::$when_unset;
        }

        impl Activatable for $name {
            fn activate(&self) {
                self.toggle();
            }
        }

        impl KeyboardActivatable for $name {}

        impl TooltipHost for $name {
            fn tooltip(&self) -> String {
                if self.is_on() { $set_label } else { $unset_label }.to_string()
            }
        }
    };
}

toggle_button! {
    /// Plays while paused, pauses while playing.
    PlayButton, "media-play-button",
    state: MediaPaused => Play / "Play",
    otherwise: Pause / "Pause",
    observes: [MediaEnded]
}

toggle_button! {
    FullscreenButton, "media-fullscreen-button",
    state: MediaIsFullscreen => ExitFullscreen / "Exit fullscreen mode",
    otherwise: EnterFullscreen / "Enter fullscreen mode",
    observes: [MediaFullscreenUnavailable]
}

toggle_button! {
    PipButton, "media-pip-button",
    state: MediaIsPip => ExitPip / "Exit picture in picture mode",
    otherwise: EnterPip / "Enter picture in picture mode",
    observes: [MediaPipUnavailable]
}

toggle_button! {
    CastButton, "media-cast-button",
    state: MediaIsCasting => ExitCast / "Stop casting",
    otherwise: EnterCast / "Start casting",
    observes: [MediaCastUnavailable]
}

/// Mutes unless the volume level is already "off".
pub struct MuteButton {
    core: ControlCore,
}

impl MuteButton {
    pub const TAG: &'static str = "media-mute-button";

    pub fn create(document: &Rc<Document>) -> Result<Rc<Self>> {
        let core = ControlCore::create(
            document,
            Self::TAG,
            "button",
            &[StateKey::MediaVolumeLevel, StateKey::MediaVolumeUnavailable],
        )?;
        let control = Rc::new(MuteButton { core });
        install(&control);
        Ok(control)
    }

    pub fn is_off(&self) -> bool {
        self.state_attribute(StateKey::MediaVolumeLevel).as_deref() == Some("off")
    }
}

impl Control for MuteButton {
    fn core(&self) -> &ControlCore {
        &self.core
    }
}

impl Activatable for MuteButton {
    fn activate(&self) {
        let request = if self.is_off() {
            RequestType::Unmute
        } else {
            RequestType::Mute
        };
        self.request(request, Detail::None);
    }
}

impl KeyboardActivatable for MuteButton {}

impl TooltipHost for MuteButton {
    fn tooltip(&self) -> String {
        if self.is_off() { "Unmute" } else { "Mute" }.to_string()
    }
}

/// Toggles the preferred subtitle track.
pub struct CaptionsButton {
    core: ControlCore,
}

impl CaptionsButton {
    pub const TAG: &'static str = "media-captions-button";

    pub fn create(document: &Rc<Document>) -> Result<Rc<Self>> {
        let core = ControlCore::create(
            document,
            Self::TAG,
            "button",
            &[StateKey::MediaSubtitlesList, StateKey::MediaSubtitlesShowing],
        )?;
        let control = Rc::new(CaptionsButton { core });
        install(&control);
        Ok(control)
    }

    pub fn is_showing(&self) -> bool {
        self.has_state(StateKey::MediaSubtitlesShowing)
    }
}

impl Control for CaptionsButton {
    fn core(&self) -> &ControlCore {
        &self.core
    }
}

impl Activatable for CaptionsButton {
    fn activate(&self) {
        self.request(RequestType::ToggleSubtitles, Detail::None);
    }
}

impl KeyboardActivatable for CaptionsButton {}

impl TooltipHost for CaptionsButton {
    fn tooltip(&self) -> String {
        if self.is_showing() {
            "Disable captions"
        } else {
            "Enable captions"
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// Seeks by `seekoffset` seconds (30 by default).
pub struct SeekButton {
    core: ControlCore,
    direction: SeekDirection,
}

impl SeekButton {
    pub fn create(document: &Rc<Document>, direction: SeekDirection) -> Result<Rc<Self>> {
        let tag = match direction {
            SeekDirection::Forward => "media-seek-forward-button",
            SeekDirection::Backward => "media-seek-backward-button",
        };
        let core = ControlCore::create(document, tag, "button", &[StateKey::MediaCurrentTime])?;
        let control = Rc::new(SeekButton { core, direction });
        install(&control);
        Ok(control)
    }

    pub fn offset(&self) -> f64 {
        self.element()
            .attribute(SEEK_OFFSET)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SEEK_BUTTON_OFFSET)
    }

    pub fn set_offset(&self, offset: f64) {
        self.element().set_attribute(SEEK_OFFSET, &offset.to_string());
    }
}

impl Control for SeekButton {
    fn core(&self) -> &ControlCore {
        &self.core
    }
}

impl Activatable for SeekButton {
    fn activate(&self) {
        let current = self.number_state(StateKey::MediaCurrentTime).unwrap_or(0.0);
        let time = match self.direction {
            SeekDirection::Forward => current + self.offset(),
            SeekDirection::Backward => (current - self.offset()).max(0.0),
        };
        self.request(RequestType::Seek, Detail::Number(time));
    }
}

impl KeyboardActivatable for SeekButton {}

impl TooltipHost for SeekButton {
    fn tooltip(&self) -> String {
        let direction = match self.direction {
            SeekDirection::Forward => "forward",
            SeekDirection::Backward => "back",
        };
        format!("Seek {direction} {} seconds", self.offset())
    }
}

/// Seek bar with hover previews.
pub struct TimeRange {
    core: ControlCore,
}

impl TimeRange {
    pub const TAG: &'static str = "media-time-range";

    pub fn create(document: &Rc<Document>) -> Result<Rc<Self>> {
        let core = ControlCore::create(
            document,
            Self::TAG,
            "slider",
            &[
                StateKey::MediaPaused,
                StateKey::MediaDuration,
                StateKey::MediaSeekable,
                StateKey::MediaCurrentTime,
                StateKey::MediaPreviewImage,
                StateKey::MediaPreviewTime,
                StateKey::MediaPreviewChapter,
                StateKey::MediaBuffered,
                StateKey::MediaPlaybackRate,
                StateKey::MediaLoading,
                StateKey::MediaEnded,
            ],
        )?;
        Ok(Rc::new(TimeRange { core }))
    }

    /// Seekable window, falling back to `[0, duration]`.
    pub fn seekable(&self) -> (f64, f64) {
        let parsed = self.state_attribute(StateKey::MediaSeekable).and_then(|s| {
            let (start, end) = s.split_once(':')?;
            Some((start.parse().ok()?, end.parse().ok()?))
        });
        parsed.unwrap_or_else(|| (0.0, self.number_state(StateKey::MediaDuration).unwrap_or(0.0)))
    }

    /// Playhead position as a fraction of the seekable window.
    pub fn value(&self) -> f64 {
        let (start, end) = self.seekable();
        let span = end - start;
        if span <= 0.0 {
            return 0.0;
        }
        let current = self.number_state(StateKey::MediaCurrentTime).unwrap_or(0.0);
        ((current - start) / span).clamp(0.0, 1.0)
    }

    fn time_at(&self, fraction: f64) -> f64 {
        let (start, end) = self.seekable();
        start + fraction.clamp(0.0, 1.0) * (end - start)
    }

    pub fn seek_to(&self, fraction: f64) {
        self.request(RequestType::Seek, Detail::Number(self.time_at(fraction)));
    }

    /// Ask for a preview at `fraction`, or clear it with `None`.
    pub fn preview_at(&self, fraction: Option<f64>) {
        match fraction {
            None => self.request(RequestType::Preview, Detail::None),
            Some(_) if self.seekable().1 <= 0.0 => {}
            Some(f) => self.request(RequestType::Preview, Detail::Number(self.time_at(f))),
        }
    }

    pub fn preview_chapter(&self) -> Option<String> {
        self.state_attribute(StateKey::MediaPreviewChapter)
    }

    pub fn preview_image(&self) -> Option<String> {
        self.state_attribute(StateKey::MediaPreviewImage)
    }
}

impl Control for TimeRange {
    fn core(&self) -> &ControlCore {
        &self.core
    }
}

/// Volume slider; shows 0 while muted.
pub struct VolumeRange {
    core: ControlCore,
}

impl VolumeRange {
    pub const TAG: &'static str = "media-volume-range";

    pub fn create(document: &Rc<Document>) -> Result<Rc<Self>> {
        let core = ControlCore::create(
            document,
            Self::TAG,
            "slider",
            &[
                StateKey::MediaVolume,
                StateKey::MediaMuted,
                StateKey::MediaVolumeUnavailable,
            ],
        )?;
        Ok(Rc::new(VolumeRange { core }))
    }

    pub fn value(&self) -> f64 {
        if self.has_state(StateKey::MediaMuted) {
            return 0.0;
        }
        self.number_state(StateKey::MediaVolume).unwrap_or(1.0)
    }

    pub fn set_value(&self, volume: f64) {
        self.request(RequestType::Volume, Detail::Number(volume.clamp(0.0, 1.0)));
    }
}

impl Control for VolumeRange {
    fn core(&self) -> &ControlCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomListener, KeyPress};
    use crate::tasks::TaskQueue;
    use std::cell::RefCell;

    fn capture(doc: &Rc<Document>, node: NodeId, request: RequestType) -> Rc<RefCell<Vec<Detail>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let listener: DomListener = Rc::new(move |event: &DomEvent| {
            if let EventDetail::Request(detail) = &event.detail {
                s.borrow_mut().push(detail.clone());
            }
        });
        doc.add_listener(node, request.name(), listener);
        seen
    }

    #[test]
    fn play_button_toggles_on_paused_attribute() {
        let doc = Document::new(TaskQueue::new());
        let button = PlayButton::create(&doc).unwrap();
        let plays = capture(&doc, button.id(), RequestType::Play);
        let pauses = capture(&doc, button.id(), RequestType::Pause);

        button.element().set_attribute("mediapaused", "");
        assert_eq!(button.tooltip(), "Play");
        button.click();
        button.element().remove_attribute("mediapaused");
        button.click();
        assert_eq!(plays.borrow().len(), 1);
        assert_eq!(pauses.borrow().len(), 1);

        button.set_disabled(true);
        button.click();
        assert_eq!(pauses.borrow().len(), 1);
    }

    #[test]
    fn keyboard_activation_needs_keydown_first() {
        let doc = Document::new(TaskQueue::new());
        let button = MuteButton::create(&doc).unwrap();
        let mutes = capture(&doc, button.id(), RequestType::Mute);
        let up = DomEvent::bubbling("keyup", button.id()).with_detail(EventDetail::Key(KeyPress::new("Enter")));
        doc.dispatch(&up);
        assert!(mutes.borrow().is_empty());

        let down = DomEvent::bubbling("keydown", button.id()).with_detail(EventDetail::Key(KeyPress::new("Enter")));
        doc.dispatch(&down);
        doc.dispatch(&up);
        assert_eq!(mutes.borrow().len(), 1);
        assert_eq!(button.element().attribute("keysused").as_deref(), Some("Enter Space"));
    }

    #[test]
    fn seek_buttons_clamp_at_zero() {
        let doc = Document::new(TaskQueue::new());
        let back = SeekButton::create(&doc, SeekDirection::Backward).unwrap();
        let seeks = capture(&doc, back.id(), RequestType::Seek);
        back.element().set_attribute("mediacurrenttime", "12");
        back.activate();
        back.set_offset(5.0);
        back.activate();
        let times: Vec<Option<f64>> = seeks.borrow().iter().map(|d| d.as_number()).collect();
        assert_eq!(times, vec![Some(0.0), Some(7.0)]);
        assert_eq!(back.tooltip(), "Seek back 5 seconds");
    }

    #[test]
    fn time_range_maps_fractions_onto_seekable_window() {
        let doc = Document::new(TaskQueue::new());
        let range = TimeRange::create(&doc).unwrap();
        let previews = capture(&doc, range.id(), RequestType::Preview);
        range.preview_at(Some(0.5));
        assert!(previews.borrow().is_empty());

        range.element().set_attribute("mediaseekable", "10:110");
        range.element().set_attribute("mediacurrenttime", "60");
        assert_eq!(range.value(), 0.5);
        let seeks = capture(&doc, range.id(), RequestType::Seek);
        range.seek_to(0.25);
        range.preview_at(Some(2.0));
        range.preview_at(None);
        assert_eq!(seeks.borrow()[0].as_number(), Some(35.0));
        assert_eq!(previews.borrow()[0].as_number(), Some(110.0));
        assert!(previews.borrow()[1].is_none());
    }

    #[test]
    fn volume_range_reads_zero_while_muted() {
        let doc = Document::new(TaskQueue::new());
        let range = VolumeRange::create(&doc).unwrap();
        range.element().set_attribute("mediavolume", "0.4");
        assert_eq!(range.value(), 0.4);
        range.element().set_attribute("mediamuted", "");
        assert_eq!(range.value(), 0.0);
        let volumes = capture(&doc, range.id(), RequestType::Volume);
        range.set_value(1.5);
        assert_eq!(volumes.borrow()[0].as_number(), Some(1.0));
    }
}
