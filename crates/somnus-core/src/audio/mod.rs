//! Audio output for somnus
//!
//! A single stereo stream on a cpal device. The stream callback owns the
//! [`MixEngine`](crate::engine::MixEngine); the host keeps the returned
//! [`EngineController`](crate::engine::EngineController) and drives it from
//! its control thread.
//!
//! ```ignore
//! use somnus_core::audio::{start_audio_system, AudioConfig};
//!
//! let audio = start_audio_system(&AudioConfig::default())?;
//! let session = PlaybackSession::new(config, urls, loader, audio.controller, services);
//! // Keep `audio.handle` alive for as long as sound should play
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
pub use cpal_backend::{start_audio_system, AudioHandle, AudioSystemResult};
pub use device::{find_device_by_id, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
