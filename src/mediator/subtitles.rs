//! Subtitle and chapter tracks.

use super::Teardown;
use crate::captions::{html_to_text, text_tracks_where, update_tracks_mode};
use crate::owners::StateOwners;
use crate::platform::storage::PREF_SUBTITLES_LANG;
use crate::platform::{Listener, MediaEvent, TextTrack};
use crate::state::{Cue, StateValue, TextTrackInfo, TextTrackMode, TrackKind};
use std::rc::Rc;

/// Subtitle and caption tracks, captions first.
pub fn subtitle_tracks(owners: &StateOwners) -> Vec<Rc<dyn TextTrack>> {
    let Some(media) = &owners.media else {
        return Vec::new();
    };
    let mut tracks = text_tracks_where(&**media, |t| t.kind().is_subtitle_like());
    tracks.sort_by_key(|t| t.kind().as_str());
    tracks
}

pub fn showing_subtitle_tracks(owners: &StateOwners) -> Vec<Rc<dyn TextTrack>> {
    let Some(media) = &owners.media else {
        return Vec::new();
    };
    text_tracks_where(&**media, |t| {
        t.kind().is_subtitle_like() && t.mode() == TextTrackMode::Showing
    })
}

fn infos(tracks: &[Rc<dyn TextTrack>]) -> Vec<TextTrackInfo> {
    tracks.iter().map(|t| t.info()).collect()
}

pub(super) fn subtitles_list(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::TextTracks(infos(&subtitle_tracks(owners)))
}

pub(super) fn subtitles_showing(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::TextTracks(infos(&showing_subtitle_tracks(owners)))
}

/// Primary language subtag, lowercased.
fn primary_subtag(lang: &str) -> String {
    lang.split('-').next().unwrap_or_default().to_lowercase()
}

/// Show or hide subtitles.
///
/// `force == Some(false)` hides everything; `Some(true)` shows a track even
/// when one is already showing; `None` flips the current state. The track to
/// show is the first subtitle track, or the best match for the stored
/// language preference followed by the platform languages.
pub fn toggle_subtitle_tracks(owners: &StateOwners, force: Option<bool>) {
    let tracks = subtitle_tracks(owners);
    if tracks.is_empty() {
        return;
    }
    let showing = infos(&showing_subtitle_tracks(owners));
    let any_showing = !showing.is_empty();

    if force == Some(false) || (any_showing && force != Some(true)) {
        update_tracks_mode(TextTrackMode::Disabled, &tracks, &showing);
        return;
    }

    let mut chosen = tracks[0].clone();
    if !owners.options.no_subtitles_lang_pref {
        let mut prefs = Vec::new();
        match owners.platform.storage().get_item(PREF_SUBTITLES_LANG) {
            Ok(Some(stored)) if !stored.is_empty() => prefs.push(stored),
            Ok(_) => {}
            Err(err) => log::debug!("error reading subtitles language pref: {err}"),
        }
        prefs.extend(owners.platform.languages());
        let subtags: Vec<String> = prefs.iter().map(|p| primary_subtag(p)).collect();
        let rank = |track: &Rc<dyn TextTrack>| {
            let lang = track.language().to_lowercase();
            subtags.iter().position(|s| lang.starts_with(s.as_str()))
        };
        let best = tracks
            .iter()
            .filter_map(|t| rank(t).map(|r| (r, t)))
            .min_by_key(|(r, _)| *r);
        if let Some((_, track)) = best {
            chosen = track.clone();
        }
    }

    let target = chosen.info();
    update_tracks_mode(TextTrackMode::Disabled, &tracks, &showing);
    update_tracks_mode(TextTrackMode::Showing, &tracks, &[target]);
}

/// Turns on subtitles when `defaultSubtitles` is set and subtitle tracks
/// appear or a new source starts loading.
pub(super) fn apply_default_subtitles(_push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    let media = owners.media.clone()?;
    let snapshot = owners.clone();
    let callback: Listener = Rc::new(move |event: &MediaEvent| {
        if !snapshot.options.default_subtitles {
            return;
        }
        if event.track_kind.is_some_and(|k| !k.is_subtitle_like()) {
            return;
        }
        toggle_subtitle_tracks(&snapshot, Some(true));
    });

    let list = media.text_tracks();
    media.add_event_listener("loadstart", callback.clone());
    if let Some(list) = &list {
        list.add_event_listener("addtrack", callback.clone());
        list.add_event_listener("removetrack", callback.clone());
    }
    Some(Box::new(move || {
        media.remove_event_listener("loadstart", &callback);
        if let Some(list) = &list {
            list.remove_event_listener("addtrack", &callback);
            list.remove_event_listener("removetrack", &callback);
        }
    }))
}

pub(super) fn chapters_cues(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let Some(media) = &owners.media else {
        return StateValue::Cues(Vec::new());
    };
    let cues = text_tracks_where(&**media, |t| t.kind() == TrackKind::Chapters)
        .first()
        .map(|track| {
            track
                .cues()
                .into_iter()
                .map(|c| Cue::new(c.start_time, c.end_time, html_to_text(&c.text)))
                .collect()
        })
        .unwrap_or_default();
    StateValue::Cues(cues)
}

/// Re-evaluates chapters when a default chapters track with a source
/// finishes loading its cues.
pub(super) fn watch_chapters_load(push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    let media = owners.media.as_ref()?;
    let tracks = text_tracks_where(&**media, |t| {
        t.kind() == TrackKind::Chapters && t.is_default() && t.src().is_some()
    });
    for track in &tracks {
        track.add_event_listener("load", push.clone());
    }
    let push = push.clone();
    Some(Box::new(move || {
        for track in &tracks {
            track.remove_event_listener("load", &push);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessMedia, HeadlessTextTrack};
    use crate::owners::MediaHandle;
    use crate::platform::{MediaElement, Platform, PreferenceStore};
    use std::cell::Cell;

    fn owners(media: &Rc<HeadlessMedia>, languages: &[&str]) -> StateOwners {
        let platform = Platform::new().with_languages(languages.iter().copied());
        let mut owners = StateOwners::new(Rc::new(platform));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        owners
    }

    fn showing_langs(owners: &StateOwners) -> Vec<String> {
        showing_subtitle_tracks(owners)
            .iter()
            .map(|t| t.language())
            .collect()
    }

    #[test]
    fn lists_captions_before_subtitles() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add_track(TrackKind::Subtitles, "en", "English");
        list.add_track(TrackKind::Chapters, "en", "");
        list.add_track(TrackKind::Captions, "fr", "");
        let o = owners(&media, &["en"]);
        let kinds: Vec<TrackKind> = subtitle_tracks(&o).iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec![TrackKind::Captions, TrackKind::Subtitles]);
    }

    #[test]
    fn toggle_prefers_platform_language() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add_track(TrackKind::Subtitles, "en", "English");
        list.add_track(TrackKind::Subtitles, "es-MX", "Español");
        let o = owners(&media, &["es-ES", "en"]);
        toggle_subtitle_tracks(&o, None);
        assert_eq!(showing_langs(&o), vec!["es-MX".to_string()]);
        toggle_subtitle_tracks(&o, None);
        assert!(showing_langs(&o).is_empty());
    }

    #[test]
    fn stored_language_beats_platform_languages() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add_track(TrackKind::Subtitles, "en", "English");
        list.add_track(TrackKind::Subtitles, "de", "Deutsch");
        let o = owners(&media, &["en"]);
        o.platform
            .storage()
            .set_item(PREF_SUBTITLES_LANG, "de")
            .unwrap();
        toggle_subtitle_tracks(&o, Some(true));
        assert_eq!(showing_langs(&o), vec!["de".to_string()]);
    }

    #[test]
    fn forced_show_switches_tracks() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        let en = list.add_track(TrackKind::Subtitles, "en", "English");
        list.add_track(TrackKind::Subtitles, "ja", "日本語");
        en.set_mode(TextTrackMode::Showing);
        let mut o = owners(&media, &["ja"]);
        o.options.no_subtitles_lang_pref = true;
        toggle_subtitle_tracks(&o, Some(true));
        assert_eq!(showing_langs(&o), vec!["en".to_string()]);
        o.options.no_subtitles_lang_pref = false;
        toggle_subtitle_tracks(&o, Some(true));
        assert_eq!(showing_langs(&o), vec!["ja".to_string()]);
        toggle_subtitle_tracks(&o, Some(false));
        assert!(showing_langs(&o).is_empty());
    }

    #[test]
    fn default_subtitles_turn_on_for_new_tracks() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        let mut o = owners(&media, &["en"]);
        o.options.default_subtitles = true;
        let noop: Listener = Rc::new(|_: &MediaEvent| {});
        let teardown = apply_default_subtitles(&noop, &o).unwrap();

        list.add_track(TrackKind::Metadata, "", "thumbnails");
        assert!(showing_langs(&o).is_empty());
        list.add_track(TrackKind::Subtitles, "en", "English");
        assert_eq!(showing_langs(&o), vec!["en".to_string()]);

        teardown();
        assert_eq!(media.listener_count("loadstart"), 0);
        assert_eq!(list.listener_count(), 0);
    }

    #[test]
    fn chapters_are_read_from_first_chapters_track() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        list.add(HeadlessTextTrack::new(TrackKind::Chapters, "en", "").with_cues(vec![
            Cue::new(0.0, 10.0, "<b>Intro</b>"),
            Cue::new(10.0, 20.0, "Main"),
        ]));
        let o = owners(&media, &["en"]);
        let value = chapters_cues(&o, None);
        let cues = value.as_cues().unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Intro");
    }

    #[test]
    fn chapters_load_pushes_once_per_load() {
        let media = HeadlessMedia::new();
        let list = media.text_track_list().unwrap();
        let track = list.add(
            HeadlessTextTrack::new(TrackKind::Chapters, "en", "")
                .with_src("chapters.vtt")
                .with_default(),
        );
        let o = owners(&media, &["en"]);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let push: Listener = Rc::new(move |_: &MediaEvent| h.set(h.get() + 1));
        let teardown = watch_chapters_load(&push, &o).unwrap();
        track.load_cues(vec![Cue::new(0.0, 5.0, "One")]);
        assert_eq!(hits.get(), 1);
        teardown();
        track.load_cues(vec![Cue::new(0.0, 5.0, "One")]);
        assert_eq!(hits.get(), 1);
        assert_eq!(track.listener_count(), 0);
    }
}
