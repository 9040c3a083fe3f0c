//! Asset loading for a playback session
//!
//! Fetching and decoding happen off the control thread. The pieces:
//!
//! - [`AssetFetcher`]: raw bytes behind a URL (HTTP, file, or test memory)
//! - [`AssetCache`]: decoded assets resident for the session, keyed by URL
//! - [`AssetLoader`]: background thread that loads one session's instructor,
//!   soundscape and timestamp manifest per request, tagged with the
//!   requesting start token
//! - [`UrlTemplates`]: turn a [`Selection`] into [`AssetUrls`]

mod asset_loader;
mod cache;
mod fetch;
mod selection;

pub use asset_loader::{AssetLoadResult, AssetLoader, LoadedSession};
pub use cache::AssetCache;
pub use fetch::{url_extension, AssetFetcher, FetchError, FileFetcher, HttpFetcher, RouterFetcher};
pub use selection::{AssetUrls, Selection, UrlTemplates};

use basedrop::Shared;
use thiserror::Error;

use crate::audio_file::{decode_audio, AudioAsset, DecodeError};
use crate::timestamps::{ManifestError, TimestampSeries};

/// Failure to produce a decoded asset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },

    /// Loader thread has gone away
    #[error("Asset loader is not running")]
    LoaderUnavailable,
}

/// Load and decode the asset behind `url`, reusing the cached copy if resident
///
/// One attempt, no retries. Two callers racing on the same URL may both
/// decode; the cache keeps whichever finishes first and both get that copy.
pub fn load_asset(
    fetcher: &dyn AssetFetcher,
    cache: &AssetCache,
    url: &str,
) -> Result<Shared<AudioAsset>, LoadError> {
    if let Some(asset) = cache.get(url) {
        log::debug!("Asset cache hit: {}", url);
        return Ok(asset);
    }

    let bytes = fetcher.fetch(url)?;
    let asset = decode_audio(bytes, url_extension(url)).map_err(|source| LoadError::Decode {
        url: url.to_string(),
        source,
    })?;
    Ok(cache.insert(url, asset))
}

/// Fetch and parse a timestamp manifest
///
/// Fetch failures are reported as [`ManifestError::Unavailable`]; a missing
/// manifest is never fatal to a session.
pub fn load_manifest(fetcher: &dyn AssetFetcher, url: &str) -> Result<TimestampSeries, ManifestError> {
    let bytes = fetcher
        .fetch(url)
        .map_err(|e| ManifestError::Unavailable(e.to_string()))?;
    TimestampSeries::parse(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wav_bytes, MemoryFetcher};

    #[test]
    fn test_load_asset_short_circuits_on_cache() {
        let fetcher = MemoryFetcher::new().with("mem://a.wav", wav_bytes(8000, 1, 800, |_, _| 0.1));
        let cache = AssetCache::new();

        let first = load_asset(&fetcher, &cache, "mem://a.wav").unwrap();
        let second = load_asset(&fetcher, &cache, "mem://a.wav").unwrap();
        assert_eq!(first.frame_count(), 800);
        assert_eq!(second.frame_count(), 800);
        assert_eq!(fetcher.hits("mem://a.wav"), 1);
    }

    #[test]
    fn test_load_asset_errors() {
        let fetcher = MemoryFetcher::new().with("mem://bad.mp3", b"garbage".to_vec());
        let cache = AssetCache::new();

        assert!(matches!(
            load_asset(&fetcher, &cache, "mem://missing.wav"),
            Err(LoadError::Fetch(FetchError::Status { status: 404, .. }))
        ));
        assert!(matches!(
            load_asset(&fetcher, &cache, "mem://bad.mp3"),
            Err(LoadError::Decode { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_loads_share_one_copy() {
        let fetcher = MemoryFetcher::new().with("mem://a.wav", wav_bytes(8000, 2, 400, |_, _| 0.3));
        let cache = AssetCache::new();

        let (a, b) = rayon::join(
            || load_asset(&fetcher, &cache, "mem://a.wav"),
            || load_asset(&fetcher, &cache, "mem://a.wav"),
        );
        assert_eq!(*a.unwrap(), *b.unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_manifest() {
        let fetcher = MemoryFetcher::new()
            .with("mem://ok.json", b"[0, 10, 40]".to_vec())
            .with("mem://sentinel.json", br#"{"error": true}"#.to_vec());

        assert_eq!(load_manifest(&fetcher, "mem://ok.json").unwrap().max_intensity(), 2);
        assert_eq!(load_manifest(&fetcher, "mem://sentinel.json"), Err(ManifestError::Sentinel));
        assert!(matches!(
            load_manifest(&fetcher, "mem://missing.json"),
            Err(ManifestError::Unavailable(_))
        ));
    }
}
