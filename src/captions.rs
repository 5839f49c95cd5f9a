//! Text track attribute grammar and track helpers
//!
//! A track list travels through attributes as whitespace separated items:
//!
//! ```text
//! en                      subtitles, language "en", no label
//! en:English              subtitles with a label
//! cc:en:English%20CC      captions (labels are percent-encoded)
//! ```
//!
//! `sb:` prefixed items are accepted on input and normalised away.

use crate::platform::{MediaElement, TextTrack};
use crate::state::{AudioTrackInfo, Rendition, TextTrackInfo, TextTrackMode, TrackKind};
use scraper::Html;
use std::rc::Rc;

const CAPTIONS_PREFIX: &str = "cc";
const SUBTITLES_PREFIX: &str = "sb";

fn decode_label(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse one track item.
pub fn parse_text_track(item: &str) -> TextTrackInfo {
    let parts: Vec<&str> = item.split(':').collect();
    match parts.as_slice() {
        [lang] => TextTrackInfo::new(TrackKind::Subtitles, *lang, ""),
        [prefix, lang] if *prefix == CAPTIONS_PREFIX => {
            TextTrackInfo::new(TrackKind::Captions, *lang, "")
        }
        [prefix, lang] if *prefix == SUBTITLES_PREFIX => {
            TextTrackInfo::new(TrackKind::Subtitles, *lang, "")
        }
        [lang, label] => TextTrackInfo::new(TrackKind::Subtitles, *lang, decode_label(label)),
        [prefix, lang, label, ..] => {
            let kind = if *prefix == CAPTIONS_PREFIX {
                TrackKind::Captions
            } else {
                TrackKind::Subtitles
            };
            TextTrackInfo::new(kind, *lang, decode_label(label))
        }
        [] => TextTrackInfo::new(TrackKind::Subtitles, "", ""),
    }
}

/// Parse a whitespace separated track list.
pub fn parse_text_tracks(list: &str) -> Vec<TextTrackInfo> {
    list.split_whitespace().map(parse_text_track).collect()
}

pub fn stringify_text_track(track: &TextTrackInfo) -> String {
    let captions = track.kind == TrackKind::Captions;
    match (captions, track.label.is_empty()) {
        (true, true) => format!("{CAPTIONS_PREFIX}:{}", track.language),
        (true, false) => format!(
            "{CAPTIONS_PREFIX}:{}:{}",
            track.language,
            urlencoding::encode(&track.label)
        ),
        (false, true) => track.language.clone(),
        (false, false) => format!("{}:{}", track.language, urlencoding::encode(&track.label)),
    }
}

pub fn stringify_text_track_list(tracks: &[TextTrackInfo]) -> String {
    tracks
        .iter()
        .map(stringify_text_track)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `id:width:height` per rendition, omitting unknown dimensions.
pub fn stringify_rendition_list(renditions: &[Rendition]) -> String {
    renditions
        .iter()
        .map(|r| {
            let mut parts = vec![r.id.clone()];
            parts.extend(r.width.map(|w| w.to_string()));
            parts.extend(r.height.map(|h| h.to_string()));
            parts.join(":")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `id:kind:language:label` per audio track, omitting empty fields.
pub fn stringify_audio_track_list(tracks: &[AudioTrackInfo]) -> String {
    tracks
        .iter()
        .map(|t| {
            [&t.id, &t.kind, &t.language, &t.label]
                .into_iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(":")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text content of a cue payload parsed as an HTML fragment. Payloads with
/// no text content come back unchanged.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    if text.is_empty() {
        html.to_string()
    } else {
        text
    }
}

/// Value match on `{kind, language, label}`.
pub fn track_matches(track: &dyn TextTrack, selector: &TextTrackInfo) -> bool {
    track.kind() == selector.kind
        && track.language() == selector.language
        && track.label() == selector.label
}

/// Text tracks of `media` accepted by `filter`.
pub fn text_tracks_where(
    media: &dyn MediaElement,
    filter: impl Fn(&dyn TextTrack) -> bool,
) -> Vec<Rc<dyn TextTrack>> {
    media
        .text_tracks()
        .map(|list| {
            list.tracks()
                .into_iter()
                .filter(|t| filter(t.as_ref()))
                .collect()
        })
        .unwrap_or_default()
}

/// Set `mode` on every track matching one of `selectors`.
pub fn update_tracks_mode(
    mode: TextTrackMode,
    tracks: &[Rc<dyn TextTrack>],
    selectors: &[TextTrackInfo],
) {
    for track in tracks {
        if selectors.iter().any(|s| track_matches(track.as_ref(), s)) {
            track.set_mode(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_item_forms() {
        assert_eq!(
            parse_text_track("en"),
            TextTrackInfo::new(TrackKind::Subtitles, "en", "")
        );
        assert_eq!(
            parse_text_track("en:English"),
            TextTrackInfo::new(TrackKind::Subtitles, "en", "English")
        );
        assert_eq!(
            parse_text_track("cc:en:English%20CC"),
            TextTrackInfo::new(TrackKind::Captions, "en", "English CC")
        );
        assert_eq!(
            parse_text_track("sb:fr:Fran%C3%A7ais"),
            TextTrackInfo::new(TrackKind::Subtitles, "fr", "Français")
        );
        assert_eq!(
            parse_text_track("cc:de"),
            TextTrackInfo::new(TrackKind::Captions, "de", "")
        );
    }

    #[test]
    fn canonical_lists_survive_parse_and_stringify() {
        for s in ["en", "en:English fr", "cc:en:English%20CC es:Espa%C3%B1ol", "cc:ja"] {
            assert_eq!(stringify_text_track_list(&parse_text_tracks(s)), s);
        }
    }

    #[test]
    fn sb_prefix_is_normalised() {
        let tracks = parse_text_tracks("sb:en:English");
        assert_eq!(stringify_text_track_list(&tracks), "en:English");
    }

    #[test]
    fn rendition_and_audio_serializers() {
        let r = vec![
            Rendition { id: "0".into(), width: Some(1920), height: Some(1080), bitrate: None },
            Rendition { id: "1".into(), width: None, height: None, bitrate: Some(800_000) },
        ];
        assert_eq!(stringify_rendition_list(&r), "0:1920:1080 1");

        let a = vec![AudioTrackInfo {
            id: "a1".into(),
            kind: "main".into(),
            language: "en".into(),
            label: String::new(),
            enabled: true,
        }];
        assert_eq!(stringify_audio_track_list(&a), "a1:main:en");
    }

    #[test]
    fn html_is_reduced_to_text() {
        assert_eq!(html_to_text("<b>Intro</b> &amp; setup"), "Intro & setup");
        assert_eq!(html_to_text("plain"), "plain");
    }

    #[test]
    fn cue_text_keeps_stray_brackets_and_decodes_entities() {
        assert_eq!(html_to_text("1 < 2"), "1 < 2");
        assert_eq!(html_to_text("caf&#233;"), "café");
        assert_eq!(html_to_text("<i>Chapter&nbsp;1</i>"), "Chapter\u{a0}1");
        assert_eq!(html_to_text("<b></b>"), "<b></b>");
    }
}
