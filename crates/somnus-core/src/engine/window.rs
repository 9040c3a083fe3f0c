//! Sample-accurate loop windows
//!
//! A [`LoopWindow`] is a standalone copy of `[start, end)` of an asset,
//! cut at whole samples of the asset's native rate. Windows are rebuilt,
//! never edited: an intensity change produces a new window.

use std::fmt;

use basedrop::Shared;
use thiserror::Error;

use super::gc::gc_handle;
use crate::audio_file::AudioAsset;

/// The requested span holds no samples once converted and clamped
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Empty loop window: samples [{start_sample}, {end_sample}) of a {frame_count}-frame asset")]
pub struct InvalidWindowError {
    pub start_sample: usize,
    pub end_sample: usize,
    pub frame_count: usize,
}

/// Seconds to a frame index: floor, then clamp to `[0, frame_count]`
///
/// NaN and negative inputs map to 0; positive infinity maps to `frame_count`.
pub fn seconds_to_frame(seconds: f64, sample_rate: u32, frame_count: usize) -> usize {
    if seconds.is_nan() || seconds <= 0.0 {
        return 0;
    }
    let frame = (seconds * sample_rate as f64).floor();
    if frame >= frame_count as f64 {
        frame_count
    } else {
        frame as usize
    }
}

/// Immutable excerpt of an instructor track used as the loop body
#[derive(Clone)]
pub struct LoopWindow {
    start_seconds: f64,
    end_seconds: f64,
    start_sample: usize,
    end_sample: usize,
    buffer: Shared<AudioAsset>,
}

impl LoopWindow {
    /// Cut `[start_seconds, end_seconds)` out of `asset`
    ///
    /// Fails iff the clamped sample range is empty. The copy keeps the
    /// asset's sample rate and channel count and is sample-for-sample
    /// identical to the source range.
    pub fn build(
        asset: &AudioAsset,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Self, InvalidWindowError> {
        let frame_count = asset.frame_count();
        let start_sample = seconds_to_frame(start_seconds, asset.sample_rate(), frame_count);
        let end_sample = seconds_to_frame(end_seconds, asset.sample_rate(), frame_count);

        if end_sample <= start_sample {
            return Err(InvalidWindowError {
                start_sample,
                end_sample,
                frame_count,
            });
        }

        let buffer = Shared::new(&gc_handle(), asset.copy_frames(start_sample, end_sample));
        Ok(Self {
            start_seconds,
            end_seconds,
            start_sample,
            end_sample,
            buffer,
        })
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_seconds
    }

    /// First source frame (inclusive)
    pub fn start_sample(&self) -> usize {
        self.start_sample
    }

    /// Last source frame (exclusive)
    pub fn end_sample(&self) -> usize {
        self.end_sample
    }

    /// Frames in the window
    pub fn frame_count(&self) -> usize {
        self.end_sample - self.start_sample
    }

    /// The copied samples
    pub fn buffer(&self) -> &Shared<AudioAsset> {
        &self.buffer
    }
}

impl fmt::Debug for LoopWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopWindow")
            .field("start_seconds", &self.start_seconds)
            .field("end_seconds", &self.end_seconds)
            .field("start_sample", &self.start_sample)
            .field("end_sample", &self.end_sample)
            .finish_non_exhaustive()
    }
}
