//! Audio output for somnus-player
//!
//! Opens the configured cpal device through somnus-core. When no device can
//! be opened the player keeps running on a null output: a thread renders the
//! engine at real-time pace and discards the samples, so sessions, timers and
//! intensity changes behave exactly as they would with sound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use somnus_core::audio::{self, AudioConfig, AudioHandle};
use somnus_core::engine::{engine_link, EngineController, EngineRenderer};
use somnus_core::types::StereoBuffer;

/// Whichever output is keeping the engine running
pub enum Output {
    Device(AudioHandle),
    Null(NullOutput),
}

impl Output {
    pub fn sample_rate(&self) -> u32 {
        match self {
            Output::Device(handle) => handle.sample_rate(),
            Output::Null(null) => null.sample_rate,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Output::Device(handle) => format!(
                "{} Hz, {} frames (~{:.1}ms)",
                handle.sample_rate(),
                handle.buffer_size(),
                handle.latency_ms()
            ),
            Output::Null(null) => format!("null output, {} Hz", null.sample_rate),
        }
    }
}

/// Start the device, or the null output if the device cannot be opened
pub fn start_output(config: &AudioConfig) -> (Output, EngineController) {
    match audio::start_audio_system(config) {
        Ok(result) => (Output::Device(result.handle), result.controller),
        Err(e) => {
            log::warn!("Could not open audio device: {}", e);
            eprintln!("Warning: no audio output ({}), continuing silently", e);
            let sample_rate = config.target_sample_rate();
            let (controller, renderer) = engine_link(sample_rate);
            let null = NullOutput::spawn(renderer, sample_rate, config.buffer_size.frames());
            (Output::Null(null), controller)
        }
    }
}

/// Renders the engine on a timer and throws the audio away
pub struct NullOutput {
    sample_rate: u32,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NullOutput {
    pub fn spawn(mut renderer: EngineRenderer, sample_rate: u32, buffer_frames: u32) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let frames = buffer_frames.max(1) as usize;
        let period = Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64);

        let thread = std::thread::Builder::new()
            .name("null-output".into())
            .spawn(move || {
                let mut buffer = StereoBuffer::silence(frames);
                while flag.load(Ordering::Relaxed) {
                    renderer.render(&mut buffer);
                    std::thread::sleep(period);
                }
            })
            .map_err(|e| log::error!("Failed to spawn null output thread: {}", e))
            .ok();

        Self {
            sample_rate,
            running,
            thread,
        }
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
