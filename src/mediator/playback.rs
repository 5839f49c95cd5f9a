//! Core playback properties: errors, play state, volume, time and live
//! stream heuristics.

use super::{round3, Teardown};
use crate::owners::StateOwners;
use crate::platform::storage::{PREF_MUTED, PREF_VOLUME};
use crate::platform::{Listener, MediaEvent};
use crate::propagator::serialize_attribute;
use crate::state::{StateValue, StreamType, VolumeLevel};

fn is_playing_event(event: Option<&MediaEvent>) -> bool {
    event.is_some_and(|e| e.kind == "playing")
}

pub(super) fn error(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    if is_playing_event(event) {
        return StateValue::Unset;
    }
    owners
        .media
        .as_ref()
        .and_then(|m| m.error())
        .map(StateValue::Error)
        .unwrap_or_default()
}

pub(super) fn error_code(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    if is_playing_event(event) {
        return StateValue::Unset;
    }
    owners
        .media
        .as_ref()
        .and_then(|m| m.error())
        .map(|e| StateValue::Number(e.code as f64))
        .unwrap_or_default()
}

pub(super) fn error_message(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    if is_playing_event(event) {
        return StateValue::Unset;
    }
    let message = owners
        .media
        .as_ref()
        .and_then(|m| m.error())
        .map(|e| e.message)
        .unwrap_or_default();
    StateValue::Text(message)
}

pub(super) fn width(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let width = owners.media.as_ref().and_then(|m| m.video_width());
    StateValue::Number(width.unwrap_or(0.0))
}

pub(super) fn height(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let height = owners.media.as_ref().and_then(|m| m.video_height());
    StateValue::Number(height.unwrap_or(0.0))
}

pub(super) fn paused(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(owners.media.as_ref().map_or(true, |m| m.paused()))
}

pub(super) fn set_paused(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    if value.is_truthy() {
        media.pause();
    } else if let Err(err) = media.play() {
        log::debug!("play() rejected: {err}");
    }
}

/// True once a real `playing` event has been seen. Without an event (the
/// bootstrap evaluation) a media that is not paused counts as played.
pub(super) fn has_played(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    let Some(media) = &owners.media else {
        return StateValue::Bool(false);
    };
    match event {
        None => StateValue::Bool(!media.paused()),
        Some(e) => StateValue::Bool(e.kind == "playing"),
    }
}

pub(super) fn ended(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(owners.media.as_ref().is_some_and(|m| m.ended()))
}

pub(super) fn playback_rate(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Number(owners.media.as_ref().map_or(1.0, |m| m.playback_rate()))
}

pub(super) fn set_playback_rate(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    match value.as_number() {
        Some(rate) if rate.is_finite() => media.set_playback_rate(rate),
        _ => {}
    }
}

pub(super) fn muted(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(owners.media.as_ref().is_some_and(|m| m.muted()))
}

pub(super) fn set_muted(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    let muted = value.is_truthy();
    if !owners.options.no_muted_pref {
        let pref = if muted { "true" } else { "false" };
        if let Err(err) = owners.platform.storage().set_item(PREF_MUTED, pref) {
            log::debug!("error setting muted pref: {err}");
        }
    }
    media.set_muted(muted);
}

/// Apply a stored muted preference to an unmuted media.
pub(super) fn restore_muted_pref(push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    let media = owners.media.as_ref()?;
    if media.muted() || owners.options.no_muted_pref {
        return None;
    }
    match owners.platform.storage().get_item(PREF_MUTED) {
        Ok(pref) => {
            let muted = pref.as_deref() == Some("true");
            set_muted(&StateValue::Bool(muted), owners);
            push(&MediaEvent::new("volumechange"));
        }
        Err(err) => log::debug!("error getting muted pref: {err}"),
    }
    None
}

pub(super) fn volume(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let volume = owners.media.as_ref().and_then(|m| m.volume());
    StateValue::Number(volume.unwrap_or(1.0))
}

pub(super) fn set_volume(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    if !owners.options.no_volume_pref {
        let storage = owners.platform.storage();
        let written = match serialize_attribute(value) {
            Some(text) => storage.set_item(PREF_VOLUME, &text),
            None => storage.remove_item(PREF_VOLUME),
        };
        if let Err(err) = written {
            log::debug!("error setting volume pref: {err}");
        }
    }
    let volume = match value {
        StateValue::Number(n) => Some(*n),
        StateValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match volume {
        Some(v) if v.is_finite() => media.set_volume(v),
        _ => {}
    }
}

/// Apply a stored volume preference.
pub(super) fn restore_volume_pref(push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    if owners.options.no_volume_pref {
        return None;
    }
    owners.media.as_ref()?;
    match owners.platform.storage().get_item(PREF_VOLUME) {
        Ok(Some(pref)) => {
            let volume = pref.trim().parse::<f64>().unwrap_or(f64::NAN);
            set_volume(&StateValue::Number(volume), owners);
            push(&MediaEvent::new("volumechange"));
        }
        Ok(None) => {}
        Err(err) => log::debug!("error getting volume pref: {err}"),
    }
    None
}

pub(super) fn volume_level(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(media) = &owners.media else {
        return VolumeLevel::High.into();
    };
    match media.volume() {
        Some(volume) => VolumeLevel::classify(volume, media.muted()).into(),
        None => VolumeLevel::High.into(),
    }
}

pub(super) fn current_time(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Number(owners.media.as_ref().map_or(0.0, |m| m.current_time()))
}

pub(super) fn set_current_time(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    match value.as_number() {
        Some(time) if time.is_finite() => media.set_current_time(time),
        _ => {}
    }
}

pub(super) fn duration(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let native = owners.media.as_ref().map(|m| m.duration());
    if let Some(default) = owners.options.default_duration.filter(|d| *d != 0.0 && !d.is_nan()) {
        let unusable = match native {
            None => true,
            Some(d) => d == 0.0 || !d.is_finite(),
        };
        if unusable {
            return StateValue::Number(default);
        }
    }
    StateValue::Number(native.filter(|d| d.is_finite()).unwrap_or(f64::NAN))
}

pub(super) fn loading(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(owners.media.as_ref().is_some_and(|m| m.ready_state() < 3))
}

pub(super) fn seekable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(ranges) = owners.media.as_ref().and_then(|m| m.seekable()) else {
        return StateValue::Unset;
    };
    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        return StateValue::Unset;
    };
    let (start, end) = (first.0, last.1);
    if start == 0.0 && end == 0.0 {
        return StateValue::Unset;
    }
    StateValue::Range(round3(start), round3(end))
}

pub(super) fn buffered(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let ranges = owners
        .media
        .as_ref()
        .map(|m| m.buffered())
        .unwrap_or_default();
    StateValue::Ranges(
        ranges
            .into_iter()
            .map(|(start, end)| (round3(start), round3(end)))
            .collect(),
    )
}

/// Stream type reported by the media, inferred from the duration, or the
/// configured default.
pub(crate) fn resolve_stream_type(owners: &StateOwners) -> Option<StreamType> {
    let fallback = owners.options.default_stream_type();
    let Some(media) = &owners.media else {
        return fallback;
    };
    if let Some(declared) = media.stream_type().as_deref().and_then(StreamType::parse) {
        return match declared {
            StreamType::Unknown => fallback,
            known => Some(known),
        };
    }
    let duration = media.duration();
    if duration == f64::INFINITY {
        Some(StreamType::Live)
    } else if duration.is_finite() {
        Some(StreamType::OnDemand)
    } else {
        fallback
    }
}

pub(super) fn stream_type(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    resolve_stream_type(owners)
        .map(StateValue::from)
        .unwrap_or_default()
}

pub(super) fn target_live_window(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(media) = &owners.media else {
        return StateValue::Number(f64::NAN);
    };
    let window = media.target_live_window();
    let undefined = window.map_or(true, f64::is_nan);
    if undefined && resolve_stream_type(owners) == Some(StreamType::Live) {
        return StateValue::Number(0.0);
    }
    window.map(StateValue::Number).unwrap_or_default()
}

pub(super) fn time_is_live(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(media) = &owners.media else {
        return StateValue::Bool(false);
    };
    if let Some(edge) = media.live_edge_start() {
        return StateValue::Bool(!edge.is_nan() && media.current_time() >= edge);
    }
    if resolve_stream_type(owners) != Some(StreamType::Live) {
        return StateValue::Bool(false);
    }
    let Some(seekable) = media.seekable() else {
        return StateValue::Bool(true);
    };
    let Some(&(_, end)) = seekable.last() else {
        return StateValue::Bool(false);
    };
    let live_edge_start = end - owners.options.live_edge_offset();
    StateValue::Bool(media.current_time() >= live_edge_start)
}

/// Number formatting matching attribute and storage output: integers have
/// no fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        // Display never prints a fractional part for whole numbers.
        format!("{n}")
    }
}
