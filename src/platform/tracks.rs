//! Track lists and remote playback exposed by a media element.

use super::EventTarget;
use crate::error::Result;
use crate::state::{AudioTrackInfo, Cue, Rendition, TextTrackInfo, TextTrackMode, TrackKind};
use std::rc::Rc;

pub trait TextTrack: EventTarget {
    fn kind(&self) -> TrackKind;
    fn label(&self) -> String;
    fn language(&self) -> String;
    fn mode(&self) -> TextTrackMode;
    fn set_mode(&self, mode: TextTrackMode);
    fn cues(&self) -> Vec<Cue>;

    /// Source URL of the backing `<track>`, if any.
    fn src(&self) -> Option<String> {
        None
    }

    /// Whether the backing `<track>` carries the `default` flag.
    fn is_default(&self) -> bool {
        false
    }

    fn info(&self) -> TextTrackInfo {
        TextTrackInfo::new(self.kind(), self.language(), self.label())
    }
}

/// Fires `addtrack`, `removetrack` and `change`.
pub trait TextTrackList: EventTarget {
    fn tracks(&self) -> Vec<Rc<dyn TextTrack>>;

    fn len(&self) -> usize {
        self.tracks().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fires `addrendition`, `removerendition` and `change`.
pub trait RenditionList: EventTarget {
    fn renditions(&self) -> Vec<Rendition>;
    fn selected_index(&self) -> Option<usize>;
    fn set_selected_index(&self, index: Option<usize>);

    fn len(&self) -> usize {
        self.renditions().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fires `addtrack`, `removetrack` and `change`.
pub trait AudioTrackList: EventTarget {
    fn tracks(&self) -> Vec<AudioTrackInfo>;
    fn set_enabled(&self, id: &str, enabled: bool);

    fn len(&self) -> usize {
        self.tracks().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Connecting,
    Connected,
    Disconnected,
}

/// Remote playback (cast) controller. Fires `connect`, `connecting` and
/// `disconnect`.
pub trait RemotePlayback: EventTarget {
    fn state(&self) -> RemoteState;

    /// Show the device picker (connect) or the session dialog (disconnect).
    fn prompt(&self) -> Result<()>;

    /// Start watching device availability. The callback receives `true`
    /// when at least one device is reachable.
    fn watch_availability(&self, callback: Rc<dyn Fn(bool)>) -> Result<()>;

    fn cancel_watch_availability(&self) -> Result<()>;
}
