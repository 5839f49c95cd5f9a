//! User preference persistence
//!
//! Muted, volume and subtitle language preferences survive across players
//! through a small key-value store. Writers race with last-write-wins.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PREF_MUTED: &str = "media-chrome-pref-muted";
pub const PREF_VOLUME: &str = "media-chrome-pref-volume";
pub const PREF_SUBTITLES_LANG: &str = "media-chrome-pref-subtitles-lang";

pub trait PreferenceStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-memory store. `fail_writes` simulates a full or disabled storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
    fail_writes: std::cell::Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl PreferenceStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::Storage("quota exceeded".into()));
        }
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::Storage("storage disabled".into()));
        }
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Preferences kept in a JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    items: RefCell<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    /// Open (or lazily create) the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(JsonFileStorage {
            path,
            items: RefCell::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&*self.items.borrow())?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trip_and_failure() {
        let s = MemoryStorage::new();
        s.set_item(PREF_VOLUME, "0.4").unwrap();
        assert_eq!(s.get_item(PREF_VOLUME).unwrap().as_deref(), Some("0.4"));
        s.set_fail_writes(true);
        assert!(s.set_item(PREF_MUTED, "true").is_err());
        assert_eq!(s.get_item(PREF_MUTED).unwrap(), None);
    }

    #[test]
    fn json_file_storage_persists_between_opens() {
        let path = std::env::temp_dir().join(format!("rfmedia-prefs-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let s = JsonFileStorage::open(&path).unwrap();
            s.set_item(PREF_SUBTITLES_LANG, "fr").unwrap();
        }
        let s = JsonFileStorage::open(&path).unwrap();
        assert_eq!(s.get_item(PREF_SUBTITLES_LANG).unwrap().as_deref(), Some("fr"));
        s.remove_item(PREF_SUBTITLES_LANG).unwrap();
        assert_eq!(s.get_item(PREF_SUBTITLES_LANG).unwrap(), None);
        let _ = std::fs::remove_file(&path);
    }
}
