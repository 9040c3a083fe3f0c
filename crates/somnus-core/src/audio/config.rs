//! Output device configuration

use serde::{Deserialize, Serialize};

use crate::engine::MAX_BUFFER_SIZE;

/// Default buffer size when no preference is specified (frames)
///
/// Ambient playback has no latency pressure; 1024 frames keeps the callback
/// cheap and xrun-free on small machines.
pub const DEFAULT_BUFFER_SIZE: u32 = 1024;

/// Smallest buffer a fixed request is clamped to
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Default output sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSize {
    /// Use [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to a sane range)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames to request from the device
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32),
        }
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, PulseAudio,
/// CoreAudio, ...) so a device can be picked from a non-default host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label that includes the host if known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the output stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = [`DEFAULT_SAMPLE_RATE`])
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Sample rate to ask the device for
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(256).frames(), 256);
        assert_eq!(BufferSize::Fixed(1).frames(), MIN_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(1 << 20).frames(), MAX_BUFFER_SIZE as u32);
    }

    #[test]
    fn test_yaml_partial_config() {
        let config: AudioConfig = serde_yaml::from_str("sample_rate: 44100\n").unwrap();
        assert_eq!(config.target_sample_rate(), 44100);
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert!(config.device.is_none());

        let config: AudioConfig = serde_yaml::from_str(
            "device:\n  name: hw:1,0\n  host: ALSA\nbuffer_size: !fixed 512\n",
        )
        .unwrap();
        assert_eq!(config.device.unwrap().display_label(), "[ALSA] hw:1,0");
        assert_eq!(config.buffer_size.frames(), 512);
    }

    #[test]
    fn test_builder() {
        let config = AudioConfig::default()
            .with_device(DeviceId::new("default"))
            .with_buffer_frames(128)
            .with_sample_rate(44100);
        assert_eq!(config.device, Some(DeviceId::new("default")));
        assert_eq!(config.buffer_size, BufferSize::Fixed(128));
        assert_eq!(config.target_sample_rate(), 44100);
    }
}
