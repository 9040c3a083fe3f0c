//! Blend control and gain smoothing
//!
//! One blend value in percent sets both channel gains:
//!
//! ```text
//! instructor = (100 - blend) / 100
//! soundscape = blend / 100
//! ```
//!
//! The engine never jumps to a new gain. Each change is ramped linearly
//! across the next processing quantum.

/// Default blend: equal parts instructor and soundscape
pub const DEFAULT_BLEND_PERCENT: u8 = 50;

/// The listener's instructor/soundscape balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixState {
    blend_percent: u8,
}

impl MixState {
    /// Create from a blend percentage, clamped to [0, 100]
    pub fn new(blend_percent: i64) -> Self {
        Self {
            blend_percent: blend_percent.clamp(0, 100) as u8,
        }
    }

    pub fn blend_percent(&self) -> u8 {
        self.blend_percent
    }

    /// Set the blend, clamped to [0, 100]
    pub fn set_blend(&mut self, percent: i64) {
        *self = Self::new(percent);
    }

    /// Gain applied to the instructor voice
    pub fn instructor_gain(&self) -> f32 {
        (100 - self.blend_percent) as f32 / 100.0
    }

    /// Gain applied to the soundscape voice
    pub fn soundscape_gain(&self) -> f32 {
        self.blend_percent as f32 / 100.0
    }
}

impl Default for MixState {
    fn default() -> Self {
        Self::new(DEFAULT_BLEND_PERCENT as i64)
    }
}

/// Linearly ramped gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    current: f32,
    target: f32,
}

impl GainRamp {
    pub fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
        }
    }

    /// Ramp towards `gain` over the next quantum
    pub fn set_target(&mut self, gain: f32) {
        self.target = gain.clamp(0.0, 1.0);
    }

    /// Jump straight to `gain`
    pub fn snap(&mut self, gain: f32) {
        self.set_target(gain);
        self.current = self.target;
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Start one quantum: returns `(from, to)` and lands on the target
    #[inline]
    pub fn begin_quantum(&mut self) -> (f32, f32) {
        let from = self.current;
        self.current = self.target;
        (from, self.target)
    }
}

/// Gain at `frame` of an `n`-frame quantum ramping `from` -> `to`
///
/// The last frame reaches `to` exactly.
#[inline]
pub fn ramp_at(from: f32, to: f32, frame: usize, n: usize) -> f32 {
    if from == to || n == 0 {
        return to;
    }
    from + (to - from) * ((frame + 1) as f32 / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_gains() {
        let mix = MixState::new(30);
        assert!((mix.instructor_gain() - 0.7).abs() < 1e-6);
        assert!((mix.soundscape_gain() - 0.3).abs() < 1e-6);

        assert_eq!(MixState::new(0).instructor_gain(), 1.0);
        assert_eq!(MixState::new(0).soundscape_gain(), 0.0);
        assert_eq!(MixState::new(100).instructor_gain(), 0.0);
        assert_eq!(MixState::new(100).soundscape_gain(), 1.0);
    }

    #[test]
    fn test_blend_clamped() {
        assert_eq!(MixState::new(-20).blend_percent(), 0);
        assert_eq!(MixState::new(250).blend_percent(), 100);

        let mut mix = MixState::default();
        assert_eq!(mix.blend_percent(), 50);
        mix.set_blend(101);
        assert_eq!(mix.blend_percent(), 100);
    }

    #[test]
    fn test_gains_sum_to_one() {
        for percent in 0..=100 {
            let mix = MixState::new(percent);
            assert!((mix.instructor_gain() + mix.soundscape_gain() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ramp_lands_on_target() {
        let mut gain = GainRamp::new(0.0);
        gain.set_target(1.0);
        let (from, to) = gain.begin_quantum();
        assert_eq!((from, to), (0.0, 1.0));
        assert_eq!(ramp_at(from, to, 0, 4), 0.25);
        assert_eq!(ramp_at(from, to, 3, 4), 1.0);
        assert_eq!(gain.current(), 1.0);

        // Settled: no ramp on the next quantum
        assert_eq!(gain.begin_quantum(), (1.0, 1.0));
    }
}
