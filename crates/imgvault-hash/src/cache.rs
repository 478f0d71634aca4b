//! Persisted path → digest cache
//!
//! The cache file is one flat JSON object:
//!
//! ```json
//! { "att/cat.png": { "hash": "9f2c4e1ab07d3355", "mtime": 1714550400000 } }
//! ```
//!
//! It is a pure performance cache. Losing it only costs rehashing, so a
//! missing or corrupt file loads as an empty cache.

use crate::digest::ContentDigest;
use imgvault_vault::{VaultError, VaultPath, VaultStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Digest of one image at one modification time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCacheEntry {
    /// Digest of the file bytes
    pub hash: ContentDigest,
    /// File mtime (ms) the digest was computed at
    pub mtime: u64,
}

/// Path-keyed digest cache
///
/// Entries are only ever returned through [`HashCache::get_valid`], which
/// requires the caller's current mtime to match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashCache {
    entries: BTreeMap<VaultPath, HashCacheEntry>,
}

impl HashCache {
    /// Create an empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest for `path` if it was computed at exactly `mtime`
    #[must_use]
    pub fn get_valid(&self, path: &VaultPath, mtime: u64) -> Option<ContentDigest> {
        self.entries
            .get(path)
            .filter(|entry| entry.mtime == mtime)
            .map(|entry| entry.hash)
    }

    /// Record a freshly computed digest
    pub fn insert(&mut self, path: VaultPath, hash: ContentDigest, mtime: u64) {
        self.entries.insert(path, HashCacheEntry { hash, mtime });
    }

    /// Drop the entry for `path`
    pub fn remove(&mut self, path: &VaultPath) -> Option<HashCacheEntry> {
        self.entries.remove(path)
    }

    /// Re-key an entry after a file move
    pub fn rename(&mut self, from: &VaultPath, to: &VaultPath) {
        if let Some(entry) = self.entries.remove(from) {
            self.entries.insert(to.clone(), entry);
        }
    }

    /// Whether any entry exists for `path`, valid or not
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &VaultPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Cached paths in order
    pub fn paths(&self) -> impl Iterator<Item = &VaultPath> {
        self.entries.keys()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Parse the persisted JSON form
    ///
    /// # Errors
    /// Returns [`CacheError::Json`] if the text is not a valid cache object
    pub fn from_json(text: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the persisted JSON form
    ///
    /// # Errors
    /// Returns [`CacheError::Json`] if serialization fails
    pub fn to_json(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load the cache file, falling back to an empty cache
    pub async fn load(vault: &dyn VaultStore, location: &VaultPath) -> Self {
        if !vault.exists(location).await {
            tracing::debug!("no hash cache at {location}, starting empty");
            return Self::new();
        }
        let loaded = match vault.read_text(location).await {
            Ok(text) => Self::from_json(&text),
            Err(e) => Err(CacheError::from(e)),
        };
        match loaded {
            Ok(cache) => {
                tracing::info!("loaded {} hash cache entries from {location}", cache.len());
                cache
            }
            Err(e) => {
                tracing::warn!("hash cache at {location} unusable, starting empty: {e}");
                Self::new()
            }
        }
    }

    /// Write the cache file
    ///
    /// # Errors
    /// Returns [`CacheError`] if serialization or the write fails
    pub async fn save(&self, vault: &dyn VaultStore, location: &VaultPath) -> Result<(), CacheError> {
        let text = self.to_json()?;
        vault.write_text(location, &text).await?;
        tracing::debug!("saved {} hash cache entries to {location}", self.len());
        Ok(())
    }
}

/// Errors during cache persistence
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache text is not valid JSON of the expected shape
    #[error("cache format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the cache file failed
    #[error("cache io error: {0}")]
    Vault(#[from] VaultError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgvault_vault::MemoryVault;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    #[test]
    fn stale_mtime_is_never_returned() {
        let mut cache = HashCache::new();
        let digest = ContentDigest::compute(b"a");
        cache.insert(p("a.png"), digest, 10);

        assert_eq!(cache.get_valid(&p("a.png"), 10), Some(digest));
        assert_eq!(cache.get_valid(&p("a.png"), 11), None);
        assert!(cache.contains(&p("a.png")));
    }

    #[test]
    fn rename_moves_entry() {
        let mut cache = HashCache::new();
        cache.insert(p("a.png"), ContentDigest::compute(b"a"), 1);
        cache.rename(&p("a.png"), &p("b/a.png"));
        assert!(!cache.contains(&p("a.png")));
        assert!(cache.get_valid(&p("b/a.png"), 1).is_some());
    }

    #[test]
    fn json_is_flat_path_map() {
        let mut cache = HashCache::new();
        cache.insert(p("x.png"), ContentDigest::new([1; 8]), 42);
        let json: serde_json::Value = serde_json::from_str(&cache.to_json().unwrap()).unwrap();
        assert_eq!(json["x.png"]["hash"], "0101010101010101");
        assert_eq!(json["x.png"]["mtime"], 42);
        assert_eq!(HashCache::from_json(&cache.to_json().unwrap()).unwrap(), cache);
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let vault = MemoryVault::new();
        let location = p(".imgvault/hash-cache.json");
        vault.insert(&location, "{ not json");
        assert!(HashCache::load(&vault, &location).await.is_empty());
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let vault = MemoryVault::new();
        assert!(HashCache::load(&vault, &p("cache.json")).await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let vault = MemoryVault::new();
        let location = p(".imgvault/hash-cache.json");
        let mut cache = HashCache::new();
        cache.insert(p("a.png"), ContentDigest::compute(b"a"), 7);
        cache.save(&vault, &location).await.unwrap();
        assert_eq!(HashCache::load(&vault, &location).await, cache);
    }
}
