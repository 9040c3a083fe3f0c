//! Per-session cache of decoded assets, keyed by source URL
//!
//! The cache is an explicit object injected into the loader instead of a
//! global. Eviction policy: unbounded while the session lives, cleared when
//! the session is closed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use basedrop::Shared;

use crate::audio_file::AudioAsset;
use crate::engine::gc::gc_handle;

/// Decoded assets resident for the current session
#[derive(Default)]
pub struct AssetCache {
    assets: Mutex<HashMap<String, Shared<AudioAsset>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Shared<AudioAsset>>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.assets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the resident asset for `url`, if any
    pub fn get(&self, url: &str) -> Option<Shared<AudioAsset>> {
        self.lock().get(url).cloned()
    }

    /// Insert a freshly decoded asset
    ///
    /// If another loader finished the same URL first, its asset is kept and
    /// returned so every caller ends up sharing one copy.
    pub fn insert(&self, url: &str, asset: AudioAsset) -> Shared<AudioAsset> {
        let mut assets = self.lock();
        if let Some(existing) = assets.get(url) {
            log::debug!("Asset for {} already resident, discarding duplicate decode", url);
            return existing.clone();
        }
        let shared = Shared::new(&gc_handle(), asset);
        assets.insert(url.to_string(), shared.clone());
        shared
    }

    /// Whether an asset for `url` is resident
    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    /// Number of resident assets
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every resident asset
    pub fn clear(&self) {
        let mut assets = self.lock();
        if !assets.is_empty() {
            log::debug!("Clearing {} cached assets", assets.len());
        }
        assets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(value: f32) -> AudioAsset {
        AudioAsset::from_planar(8000, vec![vec![value; 8]]).unwrap()
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = AssetCache::new();
        let first = cache.insert("a.wav", asset(0.1));
        let second = cache.insert("a.wav", asset(0.9));
        assert_eq!(first.channel(0).unwrap()[0], 0.1);
        assert_eq!(second.channel(0).unwrap()[0], 0.1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = AssetCache::new();
        cache.insert("a.wav", asset(0.1));
        cache.insert("b.wav", asset(0.2));
        assert!(cache.contains("b.wav"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a.wav").is_none());
    }
}
