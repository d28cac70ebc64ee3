//! Best-effort preference storage.
//!
//! Reads and writes never fail outward: a missing or corrupt file yields
//! defaults, a failed write is logged and the in-memory value is kept.

use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key for the arcade mode chosen in the training view.
pub const ARCADE_MODE_KEY: &str = "pitchArcadeMode";

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// Volatile store, also the fallback when no file is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// String values kept in a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Loads `path` if it exists; any problem starts from an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Preferences in {} are not an object, ignoring", path.display());
                    Map::new()
                }
                Err(e) => {
                    warn!("Could not parse preferences {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                warn!("Could not read preferences {}: {}", path.display(), e);
                Map::new()
            }
        };
        debug!("Loaded {} preference(s) from {}", values.len(), path.display());
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        let result = serde_json::to_string_pretty(&self.values)
            .map_err(|e| e.to_string())
            .and_then(|text| fs::write(&self.path, text).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Could not save preferences to {}: {}", self.path.display(), e);
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), Value::from(value));
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audiation-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get(ARCADE_MODE_KEY), None);
        store.set(ARCADE_MODE_KEY, "gatekeeper");
        assert_eq!(store.get(ARCADE_MODE_KEY).as_deref(), Some("gatekeeper"));
    }

    #[test]
    fn file_store_persists_across_opens() {
        let path = temp_path("persist");
        let _ = fs::remove_file(&path);
        let mut store = JsonFileStore::open(&path);
        store.set(ARCADE_MODE_KEY, "off");
        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get(ARCADE_MODE_KEY).as_deref(), Some("off"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::open(&path);
        assert_eq!(store.get(ARCADE_MODE_KEY), None);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unwritable_path_keeps_value_in_memory() {
        let path = std::env::temp_dir()
            .join("audiation-missing-dir-for-test")
            .join("nested")
            .join("prefs.json");
        let mut store = JsonFileStore::open(&path);
        store.set(ARCADE_MODE_KEY, "gatekeeper");
        assert_eq!(store.get(ARCADE_MODE_KEY).as_deref(), Some("gatekeeper"));
    }
}
