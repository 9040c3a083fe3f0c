//! Fixtures shared by unit tests

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::loader::{AssetFetcher, FetchError};
use crate::session::WakeLock;

/// Encode a 16-bit PCM WAV file in memory
///
/// `sample` returns the value for `(frame, channel)` in [-1, 1].
pub fn wav_bytes(
    sample_rate: u32,
    channels: u16,
    frames: usize,
    sample: impl Fn(usize, u16) -> f32,
) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for frame in 0..frames {
            for ch in 0..channels {
                let value = sample(frame, ch).clamp(-1.0, 1.0);
                writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// In-memory fetcher keyed by URL, counting requests per URL
#[derive(Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.files.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Poll `condition` until it holds or two seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Wake lock that mirrors its state into a shared flag
pub struct FlagWakeLock(pub Arc<AtomicBool>);

impl WakeLock for FlagWakeLock {
    fn acquire(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
