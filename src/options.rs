//! Store options
//!
//! Options are plain data owned by the store. They can be deserialized from
//! JSON (scenario files) and patched at runtime with an
//! `optionschangerequest` intent.

use crate::state::StreamType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Seconds behind the live edge that still count as "live".
pub const DEFAULT_LIVE_EDGE_OFFSET: f64 = 10.0;

/// Configuration recognised by the facade and request tables.
///
/// Unrecognised keys are kept in `extra` and otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaOptions {
    pub default_subtitles: bool,
    pub default_stream_type: Option<String>,
    pub default_duration: Option<f64>,
    pub live_edge_offset: Option<f64>,
    pub seek_to_live_offset: Option<f64>,
    pub no_auto_seek_to_live: bool,
    pub no_volume_pref: bool,
    pub no_muted_pref: bool,
    pub no_subtitles_lang_pref: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl MediaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default stream type, if it names a concrete stream type.
    pub fn default_stream_type(&self) -> Option<StreamType> {
        match self.default_stream_type.as_deref().and_then(StreamType::parse) {
            Some(StreamType::Unknown) | None => None,
            known => known,
        }
    }

    pub fn live_edge_offset(&self) -> f64 {
        self.live_edge_offset.unwrap_or(DEFAULT_LIVE_EDGE_OFFSET)
    }

    pub fn seek_to_live_offset(&self) -> f64 {
        self.seek_to_live_offset.unwrap_or(0.0)
    }

    /// Merge a patch key by key. A `null` value clears the option.
    pub fn apply_patch(&mut self, patch: &OptionsPatch) {
        for (key, value) in patch.entries() {
            match key.as_str() {
                "defaultSubtitles" => self.default_subtitles = as_flag(value),
                "defaultStreamType" => self.default_stream_type = value.as_str().map(str::to_string),
                "defaultDuration" => self.default_duration = value.as_f64(),
                "liveEdgeOffset" => self.live_edge_offset = value.as_f64(),
                "seekToLiveOffset" => self.seek_to_live_offset = value.as_f64(),
                "noAutoSeekToLive" => self.no_auto_seek_to_live = as_flag(value),
                "noVolumePref" => self.no_volume_pref = as_flag(value),
                "noMutedPref" => self.no_muted_pref = as_flag(value),
                "noSubtitlesLangPref" => self.no_subtitles_lang_pref = as_flag(value),
                _ => {
                    log::trace!("storing unrecognised option {key}");
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Key/value changes carried by an `optionschangerequest`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsPatch {
    entries: Map<String, Value>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key. Builder style.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    /// Set a key to `value`, or clear it when `None`.
    pub fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self.with(key, Value::Null),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Map<String, Value>> for OptionsPatch {
    fn from(entries: Map<String, Value>) -> Self {
        OptionsPatch { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_and_keeps_unknown_keys() {
        let opts: MediaOptions = serde_json::from_str(
            r#"{"defaultSubtitles":true,"liveEdgeOffset":4,"noVolumePref":true,"brandColor":"red"}"#,
        )
        .unwrap();
        assert!(opts.default_subtitles);
        assert_eq!(opts.live_edge_offset(), 4.0);
        assert!(opts.no_volume_pref);
        assert_eq!(opts.extra.get("brandColor"), Some(&Value::from("red")));
    }

    #[test]
    fn defaults_for_live_offsets() {
        let opts = MediaOptions::default();
        assert_eq!(opts.live_edge_offset(), DEFAULT_LIVE_EDGE_OFFSET);
        assert_eq!(opts.seek_to_live_offset(), 0.0);
    }

    #[test]
    fn patch_sets_and_clears() {
        let mut opts = MediaOptions::default();
        opts.apply_patch(&OptionsPatch::new().with("seekToLiveOffset", 5.0).with("noMutedPref", true));
        assert_eq!(opts.seek_to_live_offset(), 5.0);
        assert!(opts.no_muted_pref);

        opts.apply_patch(&OptionsPatch::new().with_opt::<f64>("seekToLiveOffset", None));
        assert_eq!(opts.seek_to_live_offset, None);
    }

    #[test]
    fn unknown_default_stream_type_is_ignored() {
        let mut opts = MediaOptions::default();
        opts.default_stream_type = Some("unknown".into());
        assert_eq!(opts.default_stream_type(), None);
        opts.default_stream_type = Some("live".into());
        assert_eq!(opts.default_stream_type(), Some(StreamType::Live));
    }
}
