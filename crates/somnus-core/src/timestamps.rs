//! Phrase-boundary timestamps and loop-point math
//!
//! An instructor recording ships with a manifest of phrase markers in
//! seconds. Marker 0 is the start of the track, marker 1 ends the intro, and
//! every following marker closes one more phrase-segment. The listener's
//! intensity picks how many segments the loop contains.
//!
//! Accepted manifest payloads:
//!
//! ```text
//! [0.0, 10.0, 40.0, 70.0]                 bare array
//! { "timestamps": [0.0, 10.0, 40.0] }      wrapped
//! { "error": true, "message": "..." }      sentinel: no manifest
//! ```

use serde_json::Value;
use thiserror::Error;

/// Intro length used when no manifest is available
pub const INTRO_FALLBACK_SECONDS: f64 = 10.0;

/// Upper bound of the safety pad before the next phrase
pub const MAX_SAFETY_OFFSET_SECONDS: f64 = 0.75;

/// Safety pad as a fraction of the last included phrase gap
pub const SAFETY_OFFSET_FRACTION: f64 = 0.05;

/// Malformed or unavailable timestamp manifest
///
/// Always recovered locally: the session falls back to
/// [`TimestampSeries::fallback`] and disables the intensity control.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManifestError {
    #[error("Timestamp manifest unavailable: {0}")]
    Unavailable(String),

    #[error("Timestamp manifest reported an error")]
    Sentinel,

    #[error("Malformed timestamp manifest: {0}")]
    Malformed(String),

    #[error("Timestamp manifest is empty")]
    Empty,

    #[error("Timestamp {index} is not a finite non-negative number")]
    InvalidValue { index: usize },

    #[error("Timestamp {index} ({value}s) is earlier than the one before it")]
    NotMonotonic { index: usize, value: f64 },
}

/// Ordered, non-decreasing phrase markers in seconds (length >= 1)
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampSeries {
    markers: Vec<f64>,
}

impl TimestampSeries {
    /// Validate and wrap a list of markers
    pub fn new(markers: Vec<f64>) -> Result<Self, ManifestError> {
        if markers.is_empty() {
            return Err(ManifestError::Empty);
        }
        for (index, &value) in markers.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(ManifestError::InvalidValue { index });
            }
            if index > 0 && value < markers[index - 1] {
                return Err(ManifestError::NotMonotonic { index, value });
            }
        }
        Ok(Self { markers })
    }

    /// Series used when the manifest is missing or malformed: track start only
    pub fn fallback() -> Self {
        Self { markers: vec![0.0] }
    }

    /// Parse a manifest payload
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Malformed(e.to_string()))?;

        let list = match &value {
            Value::Array(list) => list,
            Value::Object(obj) => {
                if obj.get("error").and_then(Value::as_bool) == Some(true) {
                    return Err(ManifestError::Sentinel);
                }
                match obj.get("timestamps") {
                    Some(Value::Array(list)) => list,
                    Some(_) => {
                        return Err(ManifestError::Malformed("\"timestamps\" is not an array".into()))
                    }
                    None => return Err(ManifestError::Malformed("missing \"timestamps\"".into())),
                }
            }
            other => {
                return Err(ManifestError::Malformed(format!("unexpected payload: {}", other)));
            }
        };

        let markers = list
            .iter()
            .enumerate()
            .map(|(index, v)| v.as_f64().ok_or(ManifestError::InvalidValue { index }))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(markers)
    }

    /// Marker times in seconds
    pub fn markers(&self) -> &[f64] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Highest selectable intensity: `max(1, len - 1)`
    pub fn max_intensity(&self) -> u32 {
        (self.markers.len().saturating_sub(1)).max(1) as u32
    }

    /// Whether the listener can choose between more than one loop length
    pub fn has_intensity_control(&self) -> bool {
        self.max_intensity() > 1
    }

    /// Clamp a (possibly persisted) intensity into `[1, max_intensity]`
    pub fn clamp_intensity(&self, level: u32) -> u32 {
        level.clamp(1, self.max_intensity())
    }

    /// End of the intro: marker 1, or `fallback` without one
    pub fn intro_end_or(&self, fallback: f64) -> f64 {
        self.markers.get(1).copied().unwrap_or(fallback)
    }

    /// End of the intro with the standard 10s fallback
    pub fn intro_end(&self) -> f64 {
        self.intro_end_or(INTRO_FALLBACK_SECONDS)
    }

    /// Loop end in seconds for `intensity` phrase-segments
    ///
    /// Stops just short of the next phrase: the pad is 5% of the last
    /// included gap, at most 0.75s, and never reaches back past the previous
    /// marker. Returns `full_duration` when the series has no closing marker
    /// for the requested segment count.
    pub fn compute_loop_end(&self, intensity: u32, full_duration: f64) -> f64 {
        let segments = self.clamp_intensity(intensity) as usize;
        let boundary_index = segments + 1;
        if self.markers.len() <= 1 || boundary_index >= self.markers.len() {
            return full_duration;
        }

        let previous = self.markers[boundary_index - 1];
        let boundary = self.markers[boundary_index];
        let gap = boundary - previous;
        let offset = MAX_SAFETY_OFFSET_SECONDS.min(gap * SAFETY_OFFSET_FRACTION);
        previous.max(boundary - offset)
    }
}
