//! Listener preferences that outlive a session

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{load_config, save_config};
use crate::engine::DEFAULT_BLEND_PERCENT;

/// Countdown length used until the listener picks one
pub const DEFAULT_TIMER_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Soundscape share of the mix, 0-100
    pub blend_percent: u8,
    /// Countdown length; 0 disables the countdown
    pub timer_minutes: u32,
    /// Loop length in phrase-segments
    pub intensity_level: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            blend_percent: DEFAULT_BLEND_PERCENT,
            timer_minutes: DEFAULT_TIMER_MINUTES,
            intensity_level: 1,
        }
    }
}

/// Where preferences are read from and written to
pub trait PreferenceStore: Send {
    fn load(&self) -> Preferences;
    fn save(&mut self, preferences: &Preferences) -> Result<()>;
}

/// Preferences in a YAML file
pub struct YamlPreferenceStore {
    path: PathBuf,
}

impl YamlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl PreferenceStore for YamlPreferenceStore {
    fn load(&self) -> Preferences {
        load_config(&self.path)
    }

    fn save(&mut self, preferences: &Preferences) -> Result<()> {
        save_config(preferences, &self.path)
    }
}

/// In-memory store; clones share the same preferences
#[derive(Clone, Default)]
pub struct MemoryPreferenceStore {
    preferences: Arc<Mutex<Preferences>>,
}

impl MemoryPreferenceStore {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            preferences: Arc::new(Mutex::new(preferences)),
        }
    }

    /// Last saved preferences
    pub fn current(&self) -> Preferences {
        *self.preferences.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Preferences {
        self.current()
    }

    fn save(&mut self, preferences: &Preferences) -> Result<()> {
        *self.preferences.lock().unwrap_or_else(|e| e.into_inner()) = *preferences;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = YamlPreferenceStore::new(dir.path().join("preferences.yaml"));
        assert_eq!(store.load(), Preferences::default());

        let prefs = Preferences {
            blend_percent: 80,
            timer_minutes: 45,
            intensity_level: 3,
        };
        store.save(&prefs).unwrap();
        assert_eq!(store.load(), prefs);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.yaml");
        std::fs::write(&path, "intensity_level: 2\n").unwrap();

        let prefs = YamlPreferenceStore::new(&path).load();
        assert_eq!(prefs.intensity_level, 2);
        assert_eq!(prefs.blend_percent, DEFAULT_BLEND_PERCENT);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryPreferenceStore::default();
        let mut writer = store.clone();
        writer
            .save(&Preferences {
                blend_percent: 10,
                ..Preferences::default()
            })
            .unwrap();
        assert_eq!(store.current().blend_percent, 10);
    }
}
