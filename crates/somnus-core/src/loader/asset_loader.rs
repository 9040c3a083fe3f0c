//! Background session loader
//!
//! One request loads everything a session needs to start. The instructor
//! track (with its manifest) and the soundscape are fetched and decoded in
//! parallel on the rayon pool; results come back tagged with the start token
//! so the session can drop answers it no longer wants.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use basedrop::Shared;

use super::{load_asset, load_manifest, AssetCache, AssetFetcher, AssetUrls, LoadError};
use crate::audio_file::AudioAsset;
use crate::timestamps::{ManifestError, TimestampSeries};

struct AssetLoadRequest {
    token: u64,
    urls: AssetUrls,
}

/// Everything a session needs to start playback
pub struct LoadedSession {
    pub instructor: Shared<AudioAsset>,
    pub soundscape: Shared<AudioAsset>,
    /// Parsed manifest, or why it could not be used
    pub timestamps: Result<TimestampSeries, ManifestError>,
}

/// Result of one load request
pub struct AssetLoadResult {
    /// Start token the request was made with
    pub token: u64,
    pub result: Result<LoadedSession, LoadError>,
}

/// Background loader owning a fetcher and the session's asset cache
pub struct AssetLoader {
    request_tx: Sender<AssetLoadRequest>,
    result_rx: Receiver<AssetLoadResult>,
    cache: Arc<AssetCache>,
    _handle: JoinHandle<()>,
}

impl AssetLoader {
    /// Spawn the loader thread
    pub fn spawn(fetcher: Arc<dyn AssetFetcher>, cache: Arc<AssetCache>) -> io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<AssetLoadRequest>();
        let (result_tx, result_rx) = mpsc::channel::<AssetLoadResult>();

        let thread_cache = cache.clone();
        let handle = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || loader_thread(request_rx, result_tx, fetcher, thread_cache))?;

        Ok(Self {
            request_tx,
            result_rx,
            cache,
            _handle: handle,
        })
    }

    /// Queue a session load (non-blocking)
    pub fn request(&self, token: u64, urls: AssetUrls) -> Result<(), LoadError> {
        self.request_tx
            .send(AssetLoadRequest { token, urls })
            .map_err(|_| LoadError::LoaderUnavailable)
    }

    /// Try to receive a single result (non-blocking)
    pub fn try_recv(&self) -> Option<AssetLoadResult> {
        self.result_rx.try_recv().ok()
    }

    /// The cache this loader fills
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }
}

fn loader_thread(
    rx: Receiver<AssetLoadRequest>,
    tx: Sender<AssetLoadResult>,
    fetcher: Arc<dyn AssetFetcher>,
    cache: Arc<AssetCache>,
) {
    log::info!("Asset loader thread started");

    while let Ok(request) = rx.recv() {
        let tx = tx.clone();
        let fetcher = fetcher.clone();
        let cache = cache.clone();

        rayon::spawn(move || {
            let token = request.token;
            let result = load_session(fetcher.as_ref(), &cache, &request.urls);
            // Receiver gone means the session was dropped
            let _ = tx.send(AssetLoadResult { token, result });
        });
    }

    log::info!("Asset loader thread exiting");
}

fn load_session(
    fetcher: &dyn AssetFetcher,
    cache: &AssetCache,
    urls: &AssetUrls,
) -> Result<LoadedSession, LoadError> {
    let start = Instant::now();

    let ((instructor, timestamps), soundscape) = rayon::join(
        || {
            (
                load_asset(fetcher, cache, &urls.instructor_audio),
                load_manifest(fetcher, &urls.instructor_manifest),
            )
        },
        || load_asset(fetcher, cache, &urls.soundscape_audio),
    );

    let instructor = instructor?;
    let soundscape = soundscape?;

    if let Err(ref e) = timestamps {
        log::warn!("No usable timestamps for {}: {}", urls.instructor_audio, e);
    }

    log::info!(
        "[PERF] Session assets ready in {:?} (instructor {:.1}s, soundscape {:.1}s)",
        start.elapsed(),
        instructor.duration_seconds(),
        soundscape.duration_seconds()
    );

    Ok(LoadedSession {
        instructor,
        soundscape,
        timestamps,
    })
}
