use rfmedia::platform::JsonFileStorage;
use rfmedia::{Platform, Scenario};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::rc::Rc;

fn temp_prefs(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("rfmedia-{}-{name}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn default_subtitles_turn_on_when_loading() {
    let scenario = Scenario::from_json(
        r#"{
            "options": { "defaultSubtitles": true },
            "tracks": [
                { "kind": "chapters", "language": "en" },
                { "kind": "subtitles", "language": "en", "label": "English" }
            ],
            "steps": [
                { "step": "snapshot" },
                { "step": "load", "src": "movie.m3u8" },
                { "step": "snapshot" }
            ]
        }"#,
    )
    .unwrap();
    let report = scenario.run().unwrap();
    assert_eq!(report.snapshots[0]["mediaSubtitlesShowing"], json!([]));
    assert_eq!(
        report.snapshots[1]["mediaSubtitlesShowing"],
        json!([{ "kind": "subtitles", "language": "en", "label": "English" }])
    );
}

#[test]
fn options_requests_patch_the_store() {
    let scenario = Scenario::from_json(
        r#"{
            "steps": [
                { "step": "streamType", "streamType": "live" },
                { "step": "seekable", "start": 0, "end": 300 },
                { "step": "tick", "time": 100 },
                { "step": "request", "request": "mediaoptionschangerequest",
                  "detail": { "noAutoSeekToLive": true } },
                { "step": "request", "request": "mediaplayrequest" }
            ]
        }"#,
    )
    .unwrap();
    let report = scenario.run().unwrap();
    assert_eq!(report.state["mediaStreamType"], json!("live"));
    assert_eq!(report.state["mediaCurrentTime"], json!(100.0));
    assert_eq!(report.state["mediaPaused"], Value::Bool(false));
}

#[test]
fn errors_are_reported_until_emptied() {
    let scenario = Scenario::from_json(
        r#"{
            "steps": [
                { "step": "fail", "code": 4, "message": "unsupported source" },
                { "step": "snapshot" },
                { "step": "request", "request": "mediaplayrequest" },
                { "step": "empty" },
                { "step": "snapshot" }
            ]
        }"#,
    )
    .unwrap();
    let report = scenario.run().unwrap();
    assert_eq!(report.snapshots[0]["mediaErrorCode"], json!(4.0));
    assert_eq!(report.snapshots[1]["mediaErrorCode"], Value::Null);
    assert_eq!(report.state["mediaPaused"], Value::Bool(true));
}

#[test]
fn volume_preference_survives_between_runs() {
    let path = temp_prefs("volume");
    let first = Scenario::from_json(
        r#"{ "steps": [{ "step": "request", "request": "mediavolumerequest", "detail": 0.3 }] }"#,
    )
    .unwrap();
    let storage = JsonFileStorage::open(&path).unwrap();
    let platform = Platform::new().with_storage(Rc::new(storage));
    first.run_on(Rc::new(platform)).unwrap();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["media-chrome-pref-volume"], json!("0.3"));

    let second = Scenario::from_json(r#"{ "steps": [] }"#).unwrap();
    let storage = JsonFileStorage::open(&path).unwrap();
    let platform = Platform::new().with_storage(Rc::new(storage));
    let report = second.run_on(Rc::new(platform)).unwrap();
    assert_eq!(report.state["mediaVolume"], json!(0.3));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn malformed_scenarios_are_rejected() {
    assert!(Scenario::from_json(r#"{ "steps": [{ "step": "dance" }] }"#).is_err());

    let swap = Scenario::from_json(
        r#"{ "steps": [{ "step": "request", "request": "mediaelementchangerequest" }] }"#,
    )
    .unwrap();
    assert!(swap.run().is_err());

    let bad_track = Scenario::from_json(r#"{ "tracks": [{ "kind": "lyrics", "language": "en" }] }"#)
        .unwrap();
    assert!(bad_track.run().is_err());
}
