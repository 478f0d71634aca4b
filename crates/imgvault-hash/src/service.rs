//! Duplicate detection over the vault's images

use crate::cache::{CacheError, HashCache};
use crate::digest::ContentDigest;
use imgvault_vault::{ScanGate, VaultError, VaultPath, VaultStore};
use std::collections::BTreeSet;

/// Result of a full cache rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The cache was replaced
    Completed {
        /// Images hashed
        hashed: usize,
        /// Images that could not be read
        failed: usize,
    },
    /// A newer rebuild started; the previous cache was kept
    Superseded,
}

/// Content-addressing service backed by a [`HashCache`]
///
/// Owns the cache; every lookup revalidates against the file's current
/// mtime before trusting a cached digest.
#[derive(Debug, Default)]
pub struct HashService {
    cache: HashCache,
    gate: ScanGate,
}

impl HashService {
    /// Create service around an existing cache
    #[inline]
    #[must_use]
    pub fn new(cache: HashCache) -> Self {
        Self {
            cache,
            gate: ScanGate::new(),
        }
    }

    /// Load the persisted cache and wrap it
    pub async fn load(vault: &dyn VaultStore, location: &VaultPath) -> Self {
        Self::new(HashCache::load(vault, location).await)
    }

    /// Persist the cache
    ///
    /// # Errors
    /// Returns [`CacheError`] if the write fails
    pub async fn save(&self, vault: &dyn VaultStore, location: &VaultPath) -> Result<(), CacheError> {
        self.cache.save(vault, location).await
    }

    /// Digest of raw bytes
    #[inline]
    #[must_use]
    pub fn hash_of(content: &[u8]) -> ContentDigest {
        ContentDigest::compute(content)
    }

    /// Read-only view of the cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Handle for superseding an in-flight rebuild
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &ScanGate {
        &self.gate
    }

    /// Cached digest, only if still valid for `mtime`
    #[inline]
    #[must_use]
    pub fn cached_digest(&self, path: &VaultPath, mtime: u64) -> Option<ContentDigest> {
        self.cache.get_valid(path, mtime)
    }

    /// Valid digest for one image, recomputing when missing or stale
    ///
    /// # Errors
    /// Returns [`VaultError`] if the file cannot be stat'ed or read
    pub async fn digest_for(
        &mut self,
        vault: &dyn VaultStore,
        path: &VaultPath,
    ) -> Result<ContentDigest, VaultError> {
        let stat = vault.stat(path).await?;
        if let Some(hash) = self.cache.get_valid(path, stat.modified) {
            return Ok(hash);
        }
        if self.cache.contains(path) {
            tracing::debug!("hash cache entry for {path} is stale, recomputing");
        }

        let data = vault.read_binary(path).await?;
        let hash = Self::hash_of(&data);
        self.cache.insert(path.clone(), hash, stat.modified);
        Ok(hash)
    }

    /// Find an existing image with the same bytes as `content`
    ///
    /// Cached paths are checked first (purging entries whose file is gone),
    /// then every uncached image is hashed on demand. Each group is walked in
    /// path order, so a cached match wins over an uncached one even if the
    /// uncached path sorts earlier.
    ///
    /// # Errors
    /// Returns [`VaultError`] only if the vault cannot be listed
    pub async fn find_duplicate(
        &mut self,
        vault: &dyn VaultStore,
        content: &[u8],
    ) -> Result<Option<VaultPath>, VaultError> {
        let target = Self::hash_of(content);
        let images: BTreeSet<VaultPath> = vault.list_images().await?.into_iter().collect();

        let cached: BTreeSet<VaultPath> = self.cache.paths().cloned().collect();
        for path in &cached {
            if !images.contains(path) {
                tracing::debug!("purging hash cache entry for vanished {path}");
                self.cache.remove(path);
                continue;
            }
            if self.matches(vault, path, target).await {
                return Ok(Some(path.clone()));
            }
        }

        for path in images.difference(&cached) {
            if self.matches(vault, path, target).await {
                return Ok(Some(path.clone()));
            }
        }

        Ok(None)
    }

    async fn matches(&mut self, vault: &dyn VaultStore, path: &VaultPath, target: ContentDigest) -> bool {
        match self.digest_for(vault, path).await {
            Ok(hash) => hash == target,
            Err(e) => {
                tracing::warn!("skipping {path} during duplicate search: {e}");
                self.cache.remove(path);
                false
            }
        }
    }

    /// Clear and recompute the cache over every image
    ///
    /// The new cache is only installed if no newer rebuild started while
    /// this one was running.
    ///
    /// # Errors
    /// Returns [`VaultError`] only if the vault cannot be listed
    pub async fn rebuild(&mut self, vault: &dyn VaultStore) -> Result<RebuildOutcome, VaultError> {
        let ticket = self.gate.begin();
        let images = vault.list_images().await?;
        let mut fresh = HashCache::new();
        let mut failed = 0;

        for path in images {
            if ticket.is_superseded() {
                tracing::info!("hash rebuild {} superseded", ticket.generation());
                return Ok(RebuildOutcome::Superseded);
            }
            let hashed = hash_file(vault, &path).await;
            match hashed {
                Ok((hash, mtime)) => fresh.insert(path, hash, mtime),
                Err(e) => {
                    tracing::warn!("could not hash {path}: {e}");
                    failed += 1;
                }
            }
        }

        if ticket.is_superseded() {
            tracing::info!("hash rebuild {} superseded", ticket.generation());
            return Ok(RebuildOutcome::Superseded);
        }

        let hashed = fresh.len();
        self.cache = fresh;
        tracing::info!("hash cache rebuilt: {hashed} images, {failed} failed");
        Ok(RebuildOutcome::Completed { hashed, failed })
    }

    /// Drop the entry for a deleted image
    pub fn forget(&mut self, path: &VaultPath) {
        self.cache.remove(path);
    }

    /// Follow an image move
    pub fn rename(&mut self, from: &VaultPath, to: &VaultPath) {
        self.cache.rename(from, to);
    }

    /// Record the digest of bytes just written to `path`
    pub fn record(&mut self, path: VaultPath, hash: ContentDigest, mtime: u64) {
        self.cache.insert(path, hash, mtime);
    }
}

async fn hash_file(vault: &dyn VaultStore, path: &VaultPath) -> Result<(ContentDigest, u64), VaultError> {
    let stat = vault.stat(path).await?;
    let data = vault.read_binary(path).await?;
    Ok((HashService::hash_of(&data), stat.modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use imgvault_vault::{FileStat, MemoryVault};

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn duplicate_found_with_empty_cache() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), b"first".to_vec());
        vault.insert(&p("b.png"), b"second".to_vec());

        let mut service = HashService::default();
        let found = service.find_duplicate(&vault, b"second").await.unwrap();
        assert_eq!(found, Some(p("b.png")));
        assert!(service.find_duplicate(&vault, b"third").await.unwrap().is_none());
        assert_eq!(service.cache().len(), 2);
    }

    #[tokio::test]
    async fn stale_entry_is_recomputed() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), b"old".to_vec());

        let mut service = HashService::default();
        let old = service.digest_for(&vault, &p("a.png")).await.unwrap();

        vault.overwrite_externally(&p("a.png"), b"new".to_vec());
        let new = service.digest_for(&vault, &p("a.png")).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(new, HashService::hash_of(b"new"));
        assert!(service.find_duplicate(&vault, b"old").await.unwrap().is_none());
        assert_eq!(service.find_duplicate(&vault, b"new").await.unwrap(), Some(p("a.png")));
    }

    #[tokio::test]
    async fn vanished_entries_are_purged() {
        let vault = MemoryVault::new();
        let mut cache = HashCache::new();
        cache.insert(p("gone.png"), HashService::hash_of(b"x"), 1);
        let mut service = HashService::new(cache);

        assert!(service.find_duplicate(&vault, b"x").await.unwrap().is_none());
        assert!(!service.cache().contains(&p("gone.png")));
    }

    #[tokio::test]
    async fn cached_match_wins_over_earlier_uncached_path() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), b"same".to_vec());
        vault.insert(&p("b.png"), b"same".to_vec());

        let mut service = HashService::default();
        service.digest_for(&vault, &p("b.png")).await.unwrap();
        assert_eq!(service.find_duplicate(&vault, b"same").await.unwrap(), Some(p("b.png")));
        assert!(!service.cache().contains(&p("a.png")));
    }

    #[tokio::test]
    async fn unreadable_image_is_skipped() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), b"same".to_vec());
        vault.insert(&p("b.png"), b"same".to_vec());
        vault.fail_reads_of(&p("a.png"));

        let mut service = HashService::default();
        let found = service.find_duplicate(&vault, b"same").await.unwrap();
        assert_eq!(found, Some(p("b.png")));
    }

    #[tokio::test]
    async fn rebuild_replaces_cache() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), b"a".to_vec());
        vault.insert(&p("b.png"), b"b".to_vec());
        vault.fail_reads_of(&p("b.png"));

        let mut cache = HashCache::new();
        cache.insert(p("old.png"), HashService::hash_of(b"o"), 1);
        let mut service = HashService::new(cache);

        let outcome = service.rebuild(&vault).await.unwrap();
        assert_eq!(outcome, RebuildOutcome::Completed { hashed: 1, failed: 1 });
        assert!(!service.cache().contains(&p("old.png")));
        assert!(service.cache().contains(&p("a.png")));
    }

    /// Store that starts a competing rebuild the first time it is listed
    struct Interrupting {
        inner: MemoryVault,
        gate: ScanGate,
    }

    #[async_trait]
    impl VaultStore for Interrupting {
        async fn list_files(&self) -> Result<Vec<VaultPath>, VaultError> {
            self.gate.cancel_all();
            self.inner.list_files().await
        }
        async fn stat(&self, path: &VaultPath) -> Result<FileStat, VaultError> {
            self.inner.stat(path).await
        }
        async fn read_binary(&self, path: &VaultPath) -> Result<Vec<u8>, VaultError> {
            self.inner.read_binary(path).await
        }
        async fn read_text(&self, path: &VaultPath) -> Result<String, VaultError> {
            self.inner.read_text(path).await
        }
        async fn write_text(&self, path: &VaultPath, content: &str) -> Result<(), VaultError> {
            self.inner.write_text(path, content).await
        }
        async fn write_binary(&self, path: &VaultPath, data: &[u8]) -> Result<(), VaultError> {
            self.inner.write_binary(path, data).await
        }
        async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
            self.inner.rename(from, to).await
        }
        async fn delete(&self, path: &VaultPath) -> Result<(), VaultError> {
            self.inner.delete(path).await
        }
        async fn create_folder(&self, path: &VaultPath) -> Result<(), VaultError> {
            self.inner.create_folder(path).await
        }
        async fn exists(&self, path: &VaultPath) -> bool {
            self.inner.exists(path).await
        }
    }

    #[tokio::test]
    async fn superseded_rebuild_keeps_previous_cache() {
        let mut cache = HashCache::new();
        cache.insert(p("kept.png"), HashService::hash_of(b"k"), 1);
        let mut service = HashService::new(cache);

        let vault = Interrupting {
            inner: MemoryVault::new(),
            gate: service.gate().clone(),
        };
        vault.inner.insert(&p("a.png"), b"a".to_vec());

        let outcome = service.rebuild(&vault).await.unwrap();
        assert_eq!(outcome, RebuildOutcome::Superseded);
        assert!(service.cache().contains(&p("kept.png")));
        assert!(!service.cache().contains(&p("a.png")));
    }
}
