//! Video renditions and audio tracks.

use crate::owners::StateOwners;
use crate::platform::MediaEvent;
use crate::state::StateValue;

/// Identifier carried by a selection value; numbers compare by their text.
fn selection_id(value: &StateValue) -> Option<String> {
    match value {
        StateValue::Text(s) => Some(s.clone()),
        StateValue::Number(n) => Some(super::playback::format_number(*n)),
        _ => None,
    }
}

pub(super) fn rendition_list(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let renditions = owners
        .media
        .as_ref()
        .and_then(|m| m.video_renditions())
        .map(|list| list.renditions())
        .unwrap_or_default();
    StateValue::Renditions(renditions)
}

pub(super) fn rendition_selected(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(list) = owners.media.as_ref().and_then(|m| m.video_renditions()) else {
        return StateValue::Unset;
    };
    list.selected_index()
        .and_then(|i| list.renditions().get(i).map(|r| StateValue::Text(r.id.clone())))
        .unwrap_or_default()
}

/// Select the rendition with the given id; an unknown id selects "auto".
pub(super) fn select_rendition(value: &StateValue, owners: &StateOwners) {
    let Some(list) = owners.media.as_ref().and_then(|m| m.video_renditions()) else {
        log::warn!("rendition selection not supported by this media");
        return;
    };
    let id = selection_id(value);
    let index = list
        .renditions()
        .iter()
        .position(|r| Some(&r.id) == id.as_ref());
    if list.selected_index() != index {
        list.set_selected_index(index);
    }
}

pub(super) fn audio_track_list(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let tracks = owners
        .media
        .as_ref()
        .and_then(|m| m.audio_tracks())
        .map(|list| list.tracks())
        .unwrap_or_default();
    StateValue::AudioTracks(tracks)
}

pub(super) fn audio_track_enabled(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    owners
        .media
        .as_ref()
        .and_then(|m| m.audio_tracks())
        .and_then(|list| list.tracks().into_iter().find(|t| t.enabled))
        .map(|t| StateValue::Text(t.id))
        .unwrap_or_default()
}

/// Enable exactly the audio track with the given id.
pub(super) fn enable_audio_track(value: &StateValue, owners: &StateOwners) {
    let Some(list) = owners.media.as_ref().and_then(|m| m.audio_tracks()) else {
        log::warn!("audio track selection not supported by this media");
        return;
    };
    let id = selection_id(value);
    for track in list.tracks() {
        list.set_enabled(&track.id, Some(&track.id) == id.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;
    use crate::owners::MediaHandle;
    use crate::platform::{MediaElement, Platform, RenditionList};
    use crate::state::{AudioTrackInfo, Rendition};
    use std::rc::Rc;

    fn owners(media: &Rc<HeadlessMedia>) -> StateOwners {
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        owners
    }

    fn rendition(id: &str, height: u32) -> Rendition {
        Rendition {
            id: id.into(),
            width: None,
            height: Some(height),
            bitrate: None,
        }
    }

    #[test]
    fn selecting_renditions_by_id() {
        let media = HeadlessMedia::new();
        let list = media.attach_renditions();
        list.add(rendition("0", 360));
        list.add(rendition("1", 720));
        let o = owners(&media);
        assert!(rendition_selected(&o, None).is_unset());
        select_rendition(&StateValue::Number(1.0), &o);
        assert_eq!(rendition_selected(&o, None), StateValue::from("1"));
        select_rendition(&StateValue::from("missing"), &o);
        assert_eq!(list.selected_index(), None);
    }

    #[test]
    fn enabling_one_audio_track_disables_others() {
        let media = HeadlessMedia::new();
        let list = media.attach_audio_tracks();
        for (id, enabled) in [("en", true), ("fr", false)] {
            list.add(AudioTrackInfo {
                id: id.into(),
                kind: "main".into(),
                language: id.into(),
                label: String::new(),
                enabled,
            });
        }
        let o = owners(&media);
        assert_eq!(audio_track_enabled(&o, None), StateValue::from("en"));
        enable_audio_track(&StateValue::from("fr"), &o);
        assert_eq!(audio_track_enabled(&o, None), StateValue::from("fr"));
        let enabled: Vec<bool> = match audio_track_list(&o, None) {
            StateValue::AudioTracks(t) => t.iter().map(|t| t.enabled).collect(),
            _ => Vec::new(),
        };
        assert_eq!(enabled, vec![false, true]);
    }
}
