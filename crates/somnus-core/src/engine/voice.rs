//! Playback voices
//!
//! A voice reads one region of a shared asset at the output rate. When the
//! asset rate matches the device the cursor advances one frame per output
//! sample and a looping voice wraps exactly at the region end. Otherwise
//! the cursor advances fractionally and neighbouring frames are linearly
//! interpolated.

use basedrop::Shared;

use crate::audio_file::AudioAsset;
use crate::types::StereoSample;

/// Cursor over a region of an asset
pub struct Voice {
    source: Shared<AudioAsset>,
    start_frame: usize,
    end_frame: usize,
    looping: bool,
    /// Position relative to `start_frame`, in source frames
    position: f64,
    /// Source frames consumed per output sample
    step: f64,
    finished: bool,
}

impl Voice {
    /// Play `[start_frame, end_frame)` of `source` at `output_rate`
    ///
    /// Bounds are clamped to the asset. An empty region is finished from
    /// the start.
    pub fn region(
        source: Shared<AudioAsset>,
        start_frame: usize,
        end_frame: usize,
        looping: bool,
        output_rate: u32,
    ) -> Self {
        let end_frame = end_frame.min(source.frame_count());
        let start_frame = start_frame.min(end_frame);
        let step = if output_rate == 0 {
            1.0
        } else {
            source.sample_rate() as f64 / output_rate as f64
        };
        Self {
            source,
            start_frame,
            end_frame,
            looping,
            position: 0.0,
            step,
            finished: start_frame == end_frame,
        }
    }

    /// Play the whole asset once
    pub fn once(source: Shared<AudioAsset>, output_rate: u32) -> Self {
        let frames = source.frame_count();
        Self::region(source, 0, frames, false, output_rate)
    }

    /// Loop the whole asset forever
    pub fn looping(source: Shared<AudioAsset>, output_rate: u32) -> Self {
        let frames = source.frame_count();
        Self::region(source, 0, frames, true, output_rate)
    }

    #[inline]
    fn len(&self) -> usize {
        self.end_frame - self.start_frame
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// A non-looping voice that has played its last frame
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Produce the next output sample, or `None` once a one-shot voice is done
    #[inline]
    pub fn next_frame(&mut self) -> Option<StereoSample> {
        if self.finished {
            return None;
        }

        let len = self.len() as f64;
        if self.position >= len {
            if self.looping {
                self.position %= len;
            } else {
                self.finished = true;
                return None;
            }
        }

        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let current = self.source.stereo_frame(self.start_frame + index);

        let sample = if frac == 0.0 {
            current
        } else {
            let next_index = if index + 1 < self.len() {
                Some(index + 1)
            } else if self.looping {
                Some(0)
            } else {
                None
            };
            match next_index {
                Some(i) => current.lerp(&self.source.stereo_frame(self.start_frame + i), frac),
                None => current,
            }
        };

        self.position += self.step;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::gc_handle;

    fn counting(rate: u32, frames: usize) -> Shared<AudioAsset> {
        let data = (0..frames).map(|i| i as f32).collect();
        Shared::new(&gc_handle(), AudioAsset::from_planar(rate, vec![data]).unwrap())
    }

    fn drain(voice: &mut Voice, n: usize) -> Vec<f32> {
        (0..n).filter_map(|_| voice.next_frame()).map(|s| s.left).collect()
    }

    #[test]
    fn test_one_shot_region_plays_exactly_once() {
        let mut voice = Voice::region(counting(100, 10), 2, 5, false, 100);
        assert_eq!(drain(&mut voice, 10), vec![2.0, 3.0, 4.0]);
        assert!(voice.is_finished());
        assert!(voice.next_frame().is_none());
    }

    #[test]
    fn test_looping_wraps_without_gap() {
        let mut voice = Voice::looping(counting(100, 3), 100);
        assert_eq!(drain(&mut voice, 8), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0]);
        assert!(!voice.is_finished());
    }

    #[test]
    fn test_half_rate_source_interpolates() {
        // Source at 50 Hz played on a 100 Hz device: every other sample is a midpoint
        let mut voice = Voice::once(counting(50, 3), 100);
        assert_eq!(drain(&mut voice, 10), vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.0]);
    }

    #[test]
    fn test_empty_region_is_finished() {
        let mut voice = Voice::region(counting(100, 10), 7, 7, true, 100);
        assert!(voice.is_finished());
        assert!(voice.next_frame().is_none());
    }
}
