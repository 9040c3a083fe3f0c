//! Selection-to-URL resolution
//!
//! The host hands over three opaque ids; configurable templates turn them
//! into the three URLs the loader fetches.

use serde::{Deserialize, Serialize};

/// What the listener picked upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub session_id: String,
    pub instructor_id: String,
    pub soundscape_id: String,
}

impl Selection {
    pub fn new(
        session_id: impl Into<String>,
        instructor_id: impl Into<String>,
        soundscape_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            instructor_id: instructor_id.into(),
            soundscape_id: soundscape_id.into(),
        }
    }
}

/// URL templates with `{session}`, `{instructor}` and `{soundscape}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlTemplates {
    pub instructor_audio: String,
    pub instructor_manifest: String,
    pub soundscape_audio: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            instructor_audio: "https://media.somnus.app/sessions/{session}/{instructor}.mp3".into(),
            instructor_manifest: "https://media.somnus.app/sessions/{session}/{instructor}.json".into(),
            soundscape_audio: "https://media.somnus.app/soundscapes/{soundscape}.mp3".into(),
        }
    }
}

impl UrlTemplates {
    /// Fill every template from `selection`
    pub fn resolve(&self, selection: &Selection) -> AssetUrls {
        AssetUrls {
            instructor_audio: fill(&self.instructor_audio, selection),
            instructor_manifest: fill(&self.instructor_manifest, selection),
            soundscape_audio: fill(&self.soundscape_audio, selection),
        }
    }
}

fn fill(template: &str, selection: &Selection) -> String {
    template
        .replace("{session}", &selection.session_id)
        .replace("{instructor}", &selection.instructor_id)
        .replace("{soundscape}", &selection.soundscape_id)
}

/// Concrete locations of one session's assets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUrls {
    pub instructor_audio: String,
    pub instructor_manifest: String,
    pub soundscape_audio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fills_placeholders() {
        let templates = UrlTemplates {
            instructor_audio: "file:///srv/{session}/{instructor}.wav".into(),
            instructor_manifest: "file:///srv/{session}/{instructor}.json".into(),
            soundscape_audio: "https://cdn.test/{soundscape}.mp3?s={session}".into(),
        };
        let urls = templates.resolve(&Selection::new("deep-sleep", "maya", "rain"));
        assert_eq!(urls.instructor_audio, "file:///srv/deep-sleep/maya.wav");
        assert_eq!(urls.instructor_manifest, "file:///srv/deep-sleep/maya.json");
        assert_eq!(urls.soundscape_audio, "https://cdn.test/rain.mp3?s=deep-sleep");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let templates: UrlTemplates =
            serde_yaml::from_str("soundscape_audio: /data/{soundscape}.ogg").unwrap();
        assert_eq!(templates.soundscape_audio, "/data/{soundscape}.ogg");
        assert_eq!(templates.instructor_audio, UrlTemplates::default().instructor_audio);
    }
}
