//! Player configuration for somnus-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/somnus/config.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use somnus_core::audio::AudioConfig;
use somnus_core::config::default_config_path;
use somnus_core::loader::UrlTemplates;
use somnus_core::session::SessionConfig;

/// Config file name inside the somnus config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Preferences file name inside the somnus config directory
pub const PREFERENCES_FILE: &str = "preferences.yaml";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device settings
    pub audio: AudioConfig,
    /// Session tuning (debounce, intro fallback)
    pub session: SessionConfig,
    /// Where instructor and soundscape assets are fetched from
    pub urls: UrlTemplates,
    /// Log play/pause/leave events
    pub telemetry: bool,
    /// Keep the machine awake while playing
    pub wake_lock: bool,
    /// Preferences file; None uses the config directory
    pub preferences_path: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            session: SessionConfig::default(),
            urls: UrlTemplates::default(),
            telemetry: true,
            wake_lock: true,
            preferences_path: None,
        }
    }
}

impl PlayerConfig {
    /// Resolved preferences file location
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_path
            .clone()
            .unwrap_or_else(|| default_config_path(PREFERENCES_FILE))
    }
}

/// Returns: ~/.config/somnus/config.yaml
pub fn default_player_config_path() -> PathBuf {
    default_config_path(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use somnus_core::config::{load_config, save_config};

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert!(config.telemetry);
        assert!(config.wake_lock);
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.preferences_path().ends_with(PREFERENCES_FILE));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "wake_lock: false\nsession:\n  debounce_ms: 120\nurls:\n  soundscape_audio: /srv/rain/{soundscape}.wav\n";
        let config: PlayerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.wake_lock);
        assert!(config.telemetry);
        assert_eq!(config.session.debounce_ms, 120);
        assert_eq!(config.urls.soundscape_audio, "/srv/rain/{soundscape}.wav");
        assert_eq!(config.urls.instructor_audio, UrlTemplates::default().instructor_audio);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = PlayerConfig {
            telemetry: false,
            preferences_path: Some(dir.path().join("prefs.yaml")),
            audio: AudioConfig::default().with_sample_rate(44100),
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: PlayerConfig = load_config(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.preferences_path(), dir.path().join("prefs.yaml"));
    }
}
