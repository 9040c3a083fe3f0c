//! Decoded audio assets
//!
//! An [`AudioAsset`] is a fully decoded, immutable PCM recording held in
//! planar layout (one `Vec<f32>` per channel) at its native sample rate.
//! Instructor and soundscape tracks are decoded once with Symphonia and then
//! shared read-only between the session and the audio thread.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{Sample, StereoSample};

/// Errors raised while turning bytes into PCM
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Container or codec not recognized
    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    /// Stream recognized but the packets could not be decoded
    #[error("Corrupted audio stream: {0}")]
    Corrupted(String),

    /// Stream decoded to zero frames
    #[error("Audio stream contains no samples")]
    Empty,

    /// Channel data does not form a valid asset
    #[error("Invalid channel layout: {0}")]
    InvalidLayout(String),
}

/// Raw decoded PCM, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    sample_rate: u32,
    channels: Vec<Vec<Sample>>,
}

impl AudioAsset {
    /// Build an asset from planar channel data
    ///
    /// All channels must have the same length and the sample rate must be
    /// non-zero.
    pub fn from_planar(sample_rate: u32, channels: Vec<Vec<Sample>>) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidLayout("sample rate is zero".into()));
        }
        let Some(first) = channels.first() else {
            return Err(DecodeError::InvalidLayout("no channels".into()));
        };
        let frames = first.len();
        if let Some(bad) = channels.iter().position(|c| c.len() != frames) {
            return Err(DecodeError::InvalidLayout(format!(
                "channel {} has {} frames, expected {}",
                bad,
                channels[bad].len(),
                frames
            )));
        }
        Ok(Self { sample_rate, channels })
    }

    /// Build an asset from interleaved samples [c0, c1, .., c0, c1, ..]
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        interleaved: &[Sample],
    ) -> Result<Self, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::InvalidLayout("no channels".into()));
        }
        if interleaved.len() % channel_count != 0 {
            return Err(DecodeError::InvalidLayout(format!(
                "{} samples do not divide into {} channels",
                interleaved.len(),
                channel_count
            )));
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::from_planar(sample_rate, channels)
    }

    /// Native sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds at the native rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Read one frame as stereo
    ///
    /// Mono is duplicated to both sides; channels beyond the first two are
    /// ignored. Out-of-range frames read as silence.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> StereoSample {
        match self.channels.as_slice() {
            [mono] => mono.get(frame).map_or(StereoSample::silence(), |&s| StereoSample::mono(s)),
            [left, right, ..] => match (left.get(frame), right.get(frame)) {
                (Some(&l), Some(&r)) => StereoSample::new(l, r),
                _ => StereoSample::silence(),
            },
            [] => StereoSample::silence(),
        }
    }

    /// Copy frames `[start, end)` verbatim into a new standalone asset
    ///
    /// Bounds are clamped to the asset; the sample rate is preserved.
    pub fn copy_frames(&self, start: usize, end: usize) -> AudioAsset {
        let frames = self.frame_count();
        let end = end.min(frames);
        let start = start.min(end);
        AudioAsset {
            sample_rate: self.sample_rate,
            channels: self
                .channels
                .iter()
                .map(|c| c[start..end].to_vec())
                .collect(),
        }
    }
}

/// Decode an in-memory audio file to an [`AudioAsset`] using Symphonia
///
/// `extension` is an optional container hint (e.g. "mp3", "wav") taken from
/// the source URL.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioAsset, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("No audio track found".to_string()))?;

    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;
    let mut buf_frames = 0usize;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Corrupted(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupted(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channel_count = spec.channels.count();

        // (Re)allocate the conversion buffer when a packet is larger than any seen so far
        if sample_buf.is_none() || decoded.capacity() > buf_frames {
            buf_frames = decoded.capacity();
            sample_buf = Some(SampleBuffer::new(buf_frames as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    let asset = AudioAsset::from_interleaved(sample_rate, channel_count, &samples)?;
    log::debug!(
        "Decoded {} frames, {} channels @ {} Hz ({:.1}s)",
        asset.frame_count(),
        asset.channel_count(),
        asset.sample_rate(),
        asset.duration_seconds()
    );
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wav_bytes;

    #[test]
    fn test_interleaved_to_planar() {
        let asset = AudioAsset::from_interleaved(8000, 2, &[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]).unwrap();
        assert_eq!(asset.frame_count(), 3);
        assert_eq!(asset.channel_count(), 2);
        assert_eq!(asset.channel(0).unwrap(), &[0.1, 0.2, 0.3]);
        assert_eq!(asset.channel(1).unwrap(), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn test_layout_validation() {
        assert!(matches!(
            AudioAsset::from_planar(8000, vec![vec![0.0; 4], vec![0.0; 3]]),
            Err(DecodeError::InvalidLayout(_))
        ));
        assert!(AudioAsset::from_planar(0, vec![vec![0.0; 4]]).is_err());
        assert!(AudioAsset::from_planar(8000, vec![]).is_err());
        assert!(AudioAsset::from_interleaved(8000, 2, &[0.0; 3]).is_err());
    }

    #[test]
    fn test_stereo_frame_mono_duplicates() {
        let asset = AudioAsset::from_planar(8000, vec![vec![0.25, 0.5]]).unwrap();
        assert_eq!(asset.stereo_frame(1), StereoSample::new(0.5, 0.5));
        assert_eq!(asset.stereo_frame(2), StereoSample::silence());
    }

    #[test]
    fn test_copy_frames_clamps() {
        let asset = AudioAsset::from_planar(8000, vec![(0..10).map(|i| i as f32).collect()]).unwrap();
        let copy = asset.copy_frames(7, 100);
        assert_eq!(copy.frame_count(), 3);
        assert_eq!(copy.sample_rate(), 8000);
        assert_eq!(copy.channel(0).unwrap(), &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_decode_wav() {
        let bytes = wav_bytes(16000, 2, 1600, |frame, ch| {
            if ch == 0 {
                0.5
            } else if frame % 2 == 0 {
                0.25
            } else {
                -0.25
            }
        });
        let asset = decode_audio(bytes, Some("wav")).unwrap();
        assert_eq!(asset.sample_rate(), 16000);
        assert_eq!(asset.channel_count(), 2);
        assert_eq!(asset.frame_count(), 1600);
        assert!((asset.duration_seconds() - 0.1).abs() < 1e-9);
        let frame = asset.stereo_frame(1);
        assert!((frame.left - 0.5).abs() < 1e-3);
        assert!((frame.right + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_audio(b"definitely not audio".to_vec(), None);
        assert!(matches!(result, Err(DecodeError::Unsupported(_))));
    }
}
