//! In-memory vault store
//!
//! [`MemoryVault`] keeps every file in a map and stamps writes with a
//! logical clock, so timestamps are deterministic. Individual paths can be
//! made to fail, which is how partial-failure behaviour is exercised.

use crate::path::VaultPath;
use crate::store::{FileStat, VaultError, VaultStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Which operations should fail for which paths
#[derive(Debug, Default)]
struct Failures {
    reads: HashSet<VaultPath>,
    writes: HashSet<VaultPath>,
    renames: HashSet<VaultPath>,
    deletes: HashSet<VaultPath>,
}

#[derive(Debug, Clone)]
struct MemFile {
    data: Vec<u8>,
    created: u64,
    modified: u64,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<VaultPath, MemFile>,
    folders: BTreeSet<VaultPath>,
    clock: u64,
    writes: usize,
    failures: Failures,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, path: &VaultPath, data: Vec<u8>) {
        let now = self.tick();
        let created = self.files.get(path).map_or(now, |f| f.created);
        self.files.insert(
            path.clone(),
            MemFile {
                data,
                created,
                modified: now,
            },
        );
    }
}

/// Vault store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryVault {
    inner: Mutex<Inner>,
}

fn injected(path: &VaultPath) -> VaultError {
    VaultError::io_error(path.as_str(), std::io::Error::other("injected failure"))
}

impl MemoryVault {
    /// Create an empty vault
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file directly, bypassing failure injection and write counts
    pub fn insert(&self, path: &VaultPath, data: impl Into<Vec<u8>>) {
        self.inner.lock().put(path, data.into());
    }

    /// Simulate an edit made outside the core: new bytes, new mtime
    pub fn overwrite_externally(&self, path: &VaultPath, data: impl Into<Vec<u8>>) {
        self.insert(path, data);
    }

    /// Bytes of a file, if present
    #[must_use]
    pub fn contents(&self, path: &VaultPath) -> Option<Vec<u8>> {
        self.inner.lock().files.get(path).map(|f| f.data.clone())
    }

    /// Text of a file, if present and UTF-8
    #[must_use]
    pub fn text(&self, path: &VaultPath) -> Option<String> {
        self.contents(path).and_then(|data| String::from_utf8(data).ok())
    }

    /// Number of write calls issued through [`VaultStore`]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }

    /// Make reads of `path` fail
    pub fn fail_reads_of(&self, path: &VaultPath) {
        self.inner.lock().failures.reads.insert(path.clone());
    }

    /// Make writes to `path` fail
    pub fn fail_writes_to(&self, path: &VaultPath) {
        self.inner.lock().failures.writes.insert(path.clone());
    }

    /// Make renames of `path` fail
    pub fn fail_renames_of(&self, path: &VaultPath) {
        self.inner.lock().failures.renames.insert(path.clone());
    }

    /// Make deletes of `path` fail
    pub fn fail_deletes_of(&self, path: &VaultPath) {
        self.inner.lock().failures.deletes.insert(path.clone());
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        self.inner.lock().failures = Failures::default();
    }
}

#[async_trait]
impl VaultStore for MemoryVault {
    async fn list_files(&self) -> Result<Vec<VaultPath>, VaultError> {
        Ok(self.inner.lock().files.keys().cloned().collect())
    }

    async fn stat(&self, path: &VaultPath) -> Result<FileStat, VaultError> {
        let inner = self.inner.lock();
        let file = inner
            .files
            .get(path)
            .ok_or_else(|| VaultError::NotFound(path.clone()))?;
        Ok(FileStat {
            size: file.data.len() as u64,
            created: file.created,
            modified: file.modified,
        })
    }

    async fn read_binary(&self, path: &VaultPath) -> Result<Vec<u8>, VaultError> {
        let inner = self.inner.lock();
        if inner.failures.reads.contains(path) {
            return Err(injected(path));
        }
        inner
            .files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| VaultError::NotFound(path.clone()))
    }

    async fn read_text(&self, path: &VaultPath) -> Result<String, VaultError> {
        let data = self.read_binary(path).await?;
        String::from_utf8(data).map_err(|_| VaultError::InvalidUtf8(path.clone()))
    }

    async fn write_text(&self, path: &VaultPath, content: &str) -> Result<(), VaultError> {
        self.write_binary(path, content.as_bytes()).await
    }

    async fn write_binary(&self, path: &VaultPath, data: &[u8]) -> Result<(), VaultError> {
        let mut inner = self.inner.lock();
        inner.writes += 1;
        if inner.failures.writes.contains(path) {
            return Err(injected(path));
        }
        inner.put(path, data.to_vec());
        Ok(())
    }

    async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
        let mut inner = self.inner.lock();
        if inner.failures.renames.contains(from) {
            return Err(injected(from));
        }
        if inner.files.contains_key(to) {
            return Err(VaultError::AlreadyExists(to.clone()));
        }
        let file = inner
            .files
            .remove(from)
            .ok_or_else(|| VaultError::NotFound(from.clone()))?;
        inner.files.insert(to.clone(), file);
        Ok(())
    }

    async fn delete(&self, path: &VaultPath) -> Result<(), VaultError> {
        let mut inner = self.inner.lock();
        if inner.failures.deletes.contains(path) {
            return Err(injected(path));
        }
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| VaultError::NotFound(path.clone()))
    }

    async fn create_folder(&self, path: &VaultPath) -> Result<(), VaultError> {
        let mut inner = self.inner.lock();
        if inner.files.contains_key(path) {
            return Err(VaultError::AlreadyExists(path.clone()));
        }
        inner.folders.insert(path.clone());
        Ok(())
    }

    async fn exists(&self, path: &VaultPath) -> bool {
        let inner = self.inner.lock();
        inner.files.contains_key(path)
            || inner.folders.contains(path)
            || inner.files.keys().any(|f| f.is_within(path.as_str()))
    }
}
