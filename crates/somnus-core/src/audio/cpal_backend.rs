//! cpal output stream
//!
//! ```text
//! ┌──────────────────┐   EngineCommand   ┌─────────────────────┐
//! │  Control thread  │──────push()──────►│   Command Queue     │
//! │ (PlaybackSession)│                   │  (lock-free SPSC)   │
//! └──────────────────┘                   └──────────┬──────────┘
//!          ▲                                        │ pop()
//!          │ EngineEvent                            ▼
//! ┌────────┴─────────┐                   ┌─────────────────────┐
//! │   Event Queue    │◄──────push()──────│  cpal audio thread  │
//! │ (lock-free SPSC) │                   │  (owns MixEngine)   │
//! └──────────────────┘                   └─────────────────────┘
//! ```
//!
//! The stream callback owns the [`EngineRenderer`] outright; nothing on the
//! audio thread locks or allocates.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::engine::{engine_link, EngineController, EngineRenderer, MAX_BUFFER_SIZE};
use crate::types::StereoBuffer;

/// Keeps the output stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames as requested from the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// A running output stream plus the control end of its engine
pub struct AudioSystemResult {
    pub handle: AudioHandle,
    /// Control-side link to the engine running on the audio thread
    pub controller: EngineController,
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub latency_ms: f32,
}

/// Open the configured device and start rendering
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported_config = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;
    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    let (controller, renderer) = engine_link(sample_rate);
    let stream = build_output_stream(&device, &stream_config, CallbackState::new(renderer))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        },
        controller,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// State moved into the stream callback
struct CallbackState {
    renderer: EngineRenderer,
    /// Pre-allocated mix buffer
    buffer: StereoBuffer,
}

impl CallbackState {
    fn new(renderer: EngineRenderer) -> Self {
        Self {
            renderer,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Render one device buffer of interleaved `channels`-wide frames
    ///
    /// Stereo goes to the first two channels; any extra channels are silent.
    /// Buffers larger than the pre-allocated mix buffer are rendered in chunks.
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            self.buffer.set_len_from_capacity(n_frames);
            self.renderer.render(&mut self.buffer);

            if channels == 2 {
                chunk[..n_frames * 2].copy_from_slice(self.buffer.as_interleaved());
                continue;
            }
            for (frame, sample) in chunk.chunks_mut(channels).zip(self.buffer.as_slice()) {
                frame[0] = if channels > 1 {
                    sample.left
                } else {
                    0.5 * (sample.left + sample.right)
                };
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

/// Pick a supported config: f32, stereo and the target rate when possible
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.target_sample_rate();
    let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    // The callback writes f32, so only f32 configs are usable
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .find(|c| c.channels() >= 2 && supports_rate(c))
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 output configuration available".to_string())
        })?;

    let sample_rate = if supports_rate(best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (assets will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best_config.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: CallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.fill(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
