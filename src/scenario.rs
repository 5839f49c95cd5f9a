//! Scenario replay
//!
//! A scenario is a JSON document describing a headless media, the store
//! options and a list of steps. Replaying it drives a real [`MediaStore`]
//! and collects the snapshots it produces.
//!
//! ```json
//! {
//!   "options": { "defaultSubtitles": true },
//!   "tracks": [{ "kind": "subtitles", "language": "en", "label": "English" }],
//!   "steps": [
//!     { "step": "metadata", "duration": 60 },
//!     { "step": "request", "request": "mediaplayrequest" },
//!     { "step": "tick", "time": 12.5 },
//!     { "step": "snapshot" }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use crate::headless::{HeadlessMedia, HeadlessTextTrack};
use crate::options::{MediaOptions, OptionsPatch};
use crate::platform::{MediaElement, MediaEvent, Platform};
use crate::requests::{Detail, Intent, RequestType};
use crate::state::{MediaState, TrackKind};
use crate::store::MediaStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    pub options: MediaOptions,
    /// Preferred languages; the platform default when empty.
    pub languages: Vec<String>,
    pub tracks: Vec<TrackSpec>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackSpec {
    pub kind: String,
    pub language: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
    /// Dispatch an intent by event name, e.g. `mediaseekrequest`.
    Request {
        request: String,
        #[serde(default)]
        detail: Value,
    },
    Load { src: String },
    Metadata { duration: f64 },
    Tick { time: f64 },
    Seekable { start: f64, end: f64 },
    StreamType {
        #[serde(rename = "streamType")]
        stream_type: Option<String>,
    },
    End,
    Fail {
        code: u16,
        #[serde(default)]
        message: String,
    },
    Empty,
    /// Fire a raw media event.
    Event { kind: String },
    /// Move the virtual clock forward.
    Advance { ms: u64 },
    Languages { languages: Vec<String> },
    Snapshot,
}

/// Outcome of a replay.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    /// Snapshots broadcast to the subscriber.
    pub broadcasts: usize,
    /// States captured by `snapshot` steps.
    pub snapshots: Vec<Value>,
    /// Final state.
    pub state: Value,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Replay against a fresh platform.
    pub fn run(&self) -> Result<ScenarioReport> {
        let platform = if self.languages.is_empty() {
            Platform::new()
        } else {
            Platform::new().with_languages(self.languages.iter().cloned())
        };
        self.run_on(Rc::new(platform))
    }

    pub fn run_on(&self, platform: Rc<Platform>) -> Result<ScenarioReport> {
        let media = HeadlessMedia::new();
        if let Some(list) = media.text_track_list() {
            for spec in &self.tracks {
                let kind = TrackKind::parse(&spec.kind)
                    .ok_or_else(|| Error::Parse(format!("unknown track kind {:?}", spec.kind)))?;
                let mut track = HeadlessTextTrack::new(kind, &spec.language, &spec.label);
                if spec.default {
                    track = track.with_default();
                }
                list.add(track);
            }
        }

        let tasks = platform.tasks().clone();
        let media_owner: Rc<dyn MediaElement> = media.clone();
        let store = MediaStore::builder()
            .platform(platform.clone())
            .options(self.options.clone())
            .media(media_owner)
            .build();
        let broadcasts = Rc::new(Cell::new(0usize));
        let counter = broadcasts.clone();
        let subscription = store.subscribe(move |_: &MediaState| counter.set(counter.get() + 1));
        tasks.run_until_idle();

        let mut snapshots = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            log::debug!("step {index}: {step:?}");
            match step {
                Step::Request { request, detail } => store.dispatch(intent(request, detail)?),
                Step::Load { src } => media.load(src),
                Step::Metadata { duration } => media.load_metadata(*duration),
                Step::Tick { time } => media.tick(*time),
                Step::Seekable { start, end } => media.set_seekable(Some(vec![(*start, *end)])),
                Step::StreamType { stream_type } => media.set_stream_type(stream_type.as_deref()),
                Step::End => media.end(),
                Step::Fail { code, message } => media.fail(*code, message),
                Step::Empty => media.empty(),
                Step::Event { kind } => media.fire(MediaEvent::new(kind)),
                Step::Advance { ms } => tasks.advance(*ms),
                Step::Languages { languages } => platform.set_languages(languages.iter().cloned()),
                Step::Snapshot => snapshots.push(serde_json::to_value(store.get_state())?),
            }
            tasks.run_until_idle();
        }

        let state = serde_json::to_value(store.get_state())?;
        subscription.unsubscribe();
        Ok(ScenarioReport {
            broadcasts: broadcasts.get(),
            snapshots,
            state,
        })
    }
}

/// Build an intent from a scenario request step.
fn intent(name: &str, detail: &Value) -> Result<Intent> {
    let request = RequestType::from_name(name)
        .ok_or_else(|| Error::Parse(format!("unknown request {name:?}")))?;
    if request == RequestType::OptionsChange {
        let Value::Object(map) = detail else {
            return Err(Error::Parse("optionschangerequest needs an object detail".into()));
        };
        let patch = map
            .iter()
            .fold(OptionsPatch::new(), |patch, (k, v)| patch.with(k, v.clone()));
        return Ok(Intent::options_change(patch));
    }
    if request.is_reassignment() {
        return Err(Error::Parse(format!("{request} cannot be replayed from a scenario")));
    }
    let detail = match detail {
        Value::Null => Detail::None,
        Value::Bool(b) => Detail::Bool(*b),
        Value::Number(n) => n.as_f64().map(Detail::Number).unwrap_or_default(),
        Value::String(s) => Detail::Text(s.clone()),
        other => return Err(Error::Parse(format!("unsupported detail {other}"))),
    };
    Ok(Intent::request_with(request, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_steps() {
        let scenario = Scenario::from_json(
            r#"{"steps":[{"step":"metadata","duration":30},{"step":"advance","ms":250},{"step":"snapshot"}]}"#,
        )
        .unwrap();
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(scenario.steps[1], Step::Advance { ms: 250 }));
    }

    #[test]
    fn rejects_unknown_requests_and_owner_swaps() {
        assert!(intent("mediadancerequest", &Value::Null).is_err());
        assert!(intent("mediaelementchangerequest", &Value::Null).is_err());
        let seek = intent("mediaseekrequest", &serde_json::json!(4.5)).unwrap();
        assert_eq!(seek.detail.as_number(), Some(4.5));
    }

    #[test]
    fn replays_playback() {
        let scenario = Scenario::from_json(
            r#"{"steps":[
                {"step":"metadata","duration":60},
                {"step":"request","request":"mediaplayrequest"},
                {"step":"tick","time":12.5},
                {"step":"snapshot"}
            ]}"#,
        )
        .unwrap();
        let report = scenario.run().unwrap();
        let snap = &report.snapshots[0];
        assert_eq!(snap["mediaPaused"], Value::Bool(false));
        assert_eq!(snap["mediaCurrentTime"], serde_json::json!(12.5));
        assert_eq!(snap["mediaDuration"], serde_json::json!(60.0));
        assert!(report.broadcasts >= 3);
    }
}
