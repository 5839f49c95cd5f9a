//! `*Unavailable` probes. An unset value means the feature is available.

use super::fullscreen::has_fullscreen_support;
use super::Teardown;
use crate::owners::StateOwners;
use crate::platform::{Listener, MediaEvent};
use crate::state::{Availability, StateValue};

fn unsupported() -> StateValue {
    Some(Availability::Unsupported).into()
}

pub(super) fn fullscreen_unavailable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    if !owners.platform.support().fullscreen || !has_fullscreen_support(owners) {
        return unsupported();
    }
    StateValue::Unset
}

pub(super) fn pip_unavailable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let media_support = owners
        .media
        .as_ref()
        .is_some_and(|m| m.capabilities().picture_in_picture);
    if !owners.platform.support().picture_in_picture || !media_support {
        return unsupported();
    }
    StateValue::Unset
}

pub(super) fn volume_unavailable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let media_volume = owners.media.as_ref().and_then(|m| m.volume());
    if owners.platform.volume_supported() == Some(false) || media_volume.is_none() {
        return unsupported();
    }
    StateValue::Unset
}

/// Resolve the platform volume probe on the next microtask if it has not
/// run yet, then re-evaluate.
pub(super) fn probe_volume_support(push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    if owners.platform.volume_supported().is_none() {
        let platform = owners.platform.clone();
        let push = push.clone();
        owners.platform.tasks().queue(move || {
            platform.resolve_volume_support();
            push(&MediaEvent::new("volumesupportchange"));
        });
    }
    None
}

pub(super) fn rendition_unavailable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    match owners.media.as_ref().and_then(|m| m.video_renditions()) {
        None => unsupported(),
        Some(list) if list.is_empty() => Some(Availability::Unavailable).into(),
        Some(_) => StateValue::Unset,
    }
}

pub(super) fn audio_track_unavailable(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    match owners.media.as_ref().and_then(|m| m.audio_tracks()) {
        None => unsupported(),
        Some(list) if list.len() <= 1 => Some(Availability::Unavailable).into(),
        Some(_) => StateValue::Unset,
    }
}
