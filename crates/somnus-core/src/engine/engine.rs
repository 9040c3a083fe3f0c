//! Two-voice mix engine
//!
//! Owned exclusively by the audio thread. Renders the instructor voice and
//! the soundscape voice, each scaled by its ramped gain, into one stereo
//! buffer. The instructor slot can hold a queued voice that takes over on
//! the exact sample the current one-shot voice ends, which is how the
//! intro hands off to the loop without a gap.

use super::command::{EngineCommand, EngineEvent};
use super::mixer::{ramp_at, GainRamp, MixState};
use super::voice::Voice;
use crate::types::{StereoBuffer, StereoSample};

/// Maximum buffer size pre-allocated for real-time safety
pub const MAX_BUFFER_SIZE: usize = 8192;

struct InstructorSlot {
    token: u64,
    voice: Voice,
}

/// The audio-thread mixer
pub struct MixEngine {
    output_rate: u32,
    soundscape: Option<Voice>,
    instructor: Option<InstructorSlot>,
    queued: Option<InstructorSlot>,
    instructor_gain: GainRamp,
    soundscape_gain: GainRamp,
    events: rtrb::Producer<EngineEvent>,
    frames_rendered: u64,
}

impl MixEngine {
    /// Create an idle engine for a device running at `output_rate`
    pub fn new(output_rate: u32, events: rtrb::Producer<EngineEvent>) -> Self {
        let mix = MixState::default();
        Self {
            output_rate,
            soundscape: None,
            instructor: None,
            queued: None,
            instructor_gain: GainRamp::new(mix.instructor_gain()),
            soundscape_gain: GainRamp::new(mix.soundscape_gain()),
            events,
            frames_rendered: 0,
        }
    }

    /// Drain the command queue (lock-free)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = rx.pop() {
            self.apply(command);
        }
    }

    /// Apply one command
    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::AttachSoundscape { voice } => {
                self.soundscape = Some(voice);
            }
            EngineCommand::AttachInstructor { token, voice } => {
                self.instructor = Some(InstructorSlot { token, voice });
                self.queued = None;
            }
            EngineCommand::QueueInstructor { token, voice } => {
                let intro_running = self
                    .instructor
                    .as_ref()
                    .is_some_and(|slot| !slot.voice.is_looping());
                if intro_running {
                    self.queued = Some(InstructorSlot { token, voice });
                } else {
                    self.instructor = Some(InstructorSlot { token, voice });
                    self.queued = None;
                }
            }
            EngineCommand::DetachInstructor => {
                self.instructor = None;
                self.queued = None;
            }
            EngineCommand::DetachAll => {
                self.instructor = None;
                self.queued = None;
                self.soundscape = None;
            }
            EngineCommand::SetGains {
                instructor,
                soundscape,
            } => {
                // Nothing audible yet: no need to ramp
                if self.is_silent() {
                    self.instructor_gain.snap(instructor);
                    self.soundscape_gain.snap(soundscape);
                } else {
                    self.instructor_gain.set_target(instructor);
                    self.soundscape_gain.set_target(soundscape);
                }
            }
        }
    }

    /// Render one buffer
    pub fn process(&mut self, out: &mut StereoBuffer) {
        let n = out.len();
        let (ins_from, ins_to) = self.instructor_gain.begin_quantum();
        let (snd_from, snd_to) = self.soundscape_gain.begin_quantum();

        for i in 0..n {
            let instructor = self.next_instructor_frame();
            let soundscape = self
                .soundscape
                .as_mut()
                .and_then(Voice::next_frame)
                .unwrap_or_default();

            out[i] = instructor * ramp_at(ins_from, ins_to, i, n)
                + soundscape * ramp_at(snd_from, snd_to, i, n);
        }

        self.frames_rendered += n as u64;
    }

    /// Next instructor sample, handing off to the queued voice on the same sample
    #[inline]
    fn next_instructor_frame(&mut self) -> StereoSample {
        if let Some(slot) = self.instructor.as_mut() {
            if let Some(sample) = slot.voice.next_frame() {
                return sample;
            }
            let token = slot.token;
            self.instructor = self.queued.take();
            // Session drains events every tick; a full queue means it is gone
            let _ = self.events.push(EngineEvent::IntroFinished { token });

            if let Some(slot) = self.instructor.as_mut() {
                return slot.voice.next_frame().unwrap_or_default();
            }
        }
        StereoSample::silence()
    }

    fn is_silent(&self) -> bool {
        self.instructor.is_none() && self.soundscape.is_none()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn has_soundscape(&self) -> bool {
        self.soundscape.is_some()
    }

    pub fn has_instructor(&self) -> bool {
        self.instructor.is_some()
    }

    pub fn has_queued_instructor(&self) -> bool {
        self.queued.is_some()
    }

    /// Token of the instructor voice currently playing
    pub fn instructor_token(&self) -> Option<u64> {
        self.instructor.as_ref().map(|slot| slot.token)
    }

    /// Whether the playing instructor voice loops
    pub fn instructor_is_looping(&self) -> Option<bool> {
        self.instructor.as_ref().map(|slot| slot.voice.is_looping())
    }

    /// Current (instructor, soundscape) gains
    pub fn gains(&self) -> (f32, f32) {
        (self.instructor_gain.current(), self.soundscape_gain.current())
    }

    /// Output frames rendered since creation
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::AudioAsset;
    use crate::engine::command::event_channel;
    use crate::engine::gc::gc_handle;
    use basedrop::Shared;

    fn constant(rate: u32, frames: usize, value: f32) -> Shared<AudioAsset> {
        Shared::new(
            &gc_handle(),
            AudioAsset::from_planar(rate, vec![vec![value; frames]]).unwrap(),
        )
    }

    fn counting(rate: u32, frames: usize, offset: f32) -> Shared<AudioAsset> {
        let data = (0..frames).map(|i| offset + i as f32).collect();
        Shared::new(&gc_handle(), AudioAsset::from_planar(rate, vec![data]).unwrap())
    }

    fn engine() -> (MixEngine, rtrb::Consumer<EngineEvent>) {
        let (tx, rx) = event_channel();
        let mut engine = MixEngine::new(100, tx);
        // Instructor only, unit gain
        engine.apply(EngineCommand::SetGains {
            instructor: 1.0,
            soundscape: 0.0,
        });
        (engine, rx)
    }

    fn render(engine: &mut MixEngine, n: usize) -> Vec<f32> {
        let mut out = StereoBuffer::silence(n);
        engine.process(&mut out);
        out.as_slice().iter().map(|s| s.left).collect()
    }

    #[test]
    fn test_process_idle_engine_is_silent() {
        let (mut engine, _rx) = engine();
        assert!(render(&mut engine, 64).iter().all(|&s| s == 0.0));
        assert_eq!(engine.frames_rendered(), 64);
    }

    #[test]
    fn test_intro_hands_off_on_exact_sample() {
        let (mut engine, mut events) = engine();
        let intro = Voice::region(counting(100, 10, 0.0), 0, 3, false, 100);
        let body = Voice::region(counting(100, 10, 100.0), 0, 2, true, 100);
        engine.apply(EngineCommand::AttachInstructor { token: 4, voice: intro });
        engine.apply(EngineCommand::QueueInstructor { token: 4, voice: body });

        // Hand-off lands mid-buffer with no silent sample in between
        assert_eq!(render(&mut engine, 7), vec![0.0, 1.0, 2.0, 100.0, 101.0, 100.0, 101.0]);
        assert_eq!(events.pop().ok(), Some(EngineEvent::IntroFinished { token: 4 }));
        assert!(events.pop().is_err());
        assert_eq!(engine.instructor_is_looping(), Some(true));
        assert!(!engine.has_queued_instructor());
    }

    #[test]
    fn test_queue_after_intro_ended_starts_immediately() {
        let (mut engine, _events) = engine();
        let body = Voice::region(counting(100, 10, 0.0), 0, 4, true, 100);
        engine.apply(EngineCommand::AttachInstructor { token: 1, voice: body });

        let replacement = Voice::region(counting(100, 10, 50.0), 0, 2, true, 100);
        engine.apply(EngineCommand::QueueInstructor { token: 1, voice: replacement });
        assert!(!engine.has_queued_instructor());
        assert_eq!(render(&mut engine, 3), vec![50.0, 51.0, 50.0]);
    }

    #[test]
    fn test_detach_instructor_keeps_soundscape() {
        let (mut engine, _events) = engine();
        engine.apply(EngineCommand::SetGains {
            instructor: 0.5,
            soundscape: 0.5,
        });
        engine.apply(EngineCommand::AttachSoundscape {
            voice: Voice::looping(constant(100, 50, 0.4), 100),
        });
        engine.apply(EngineCommand::AttachInstructor {
            token: 1,
            voice: Voice::looping(constant(100, 50, 0.2), 100),
        });
        assert!(render(&mut engine, 4).iter().all(|&s| (s - 0.3).abs() < 1e-6));

        engine.apply(EngineCommand::DetachInstructor);
        assert!(engine.has_soundscape());
        assert!(render(&mut engine, 4).iter().all(|&s| (s - 0.2).abs() < 1e-6));

        engine.apply(EngineCommand::DetachAll);
        assert!(!engine.has_soundscape());
        assert!(render(&mut engine, 4).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gain_change_ramps_over_one_buffer() {
        let (mut engine, _events) = engine();
        engine.apply(EngineCommand::AttachInstructor {
            token: 1,
            voice: Voice::looping(constant(100, 50, 1.0), 100),
        });
        engine.apply(EngineCommand::SetGains {
            instructor: 0.0,
            soundscape: 1.0,
        });

        let ramp = render(&mut engine, 4);
        assert_eq!(ramp, vec![0.75, 0.5, 0.25, 0.0]);
        assert_eq!(engine.gains(), (0.0, 1.0));
        assert!(render(&mut engine, 4).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_process_commands_in_order() {
        let (mut engine, _events) = engine();
        let (mut tx, mut rx) = crate::engine::command::command_channel();
        tx.push(EngineCommand::AttachInstructor {
            token: 1,
            voice: Voice::looping(constant(100, 10, 0.1), 100),
        })
        .ok();
        tx.push(EngineCommand::DetachAll).ok();
        tx.push(EngineCommand::AttachInstructor {
            token: 2,
            voice: Voice::looping(constant(100, 10, 0.1), 100),
        })
        .ok();

        engine.process_commands(&mut rx);
        assert_eq!(engine.instructor_token(), Some(2));
    }
}
