//! Directory-backed vault store

use crate::path::VaultPath;
use crate::store::{FileStat, VaultError, VaultStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Vault store rooted at a directory on disk
///
/// Dot-directories (`.obsidian`, `.trash`, `.imgvault`, ...) are never
/// listed, though files inside them can still be read and written by path.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

fn millis(time: std::io::Result<SystemTime>) -> Option<u64> {
    let since = time.ok()?.duration_since(UNIX_EPOCH).ok()?;
    u64::try_from(since.as_millis()).ok()
}

impl FsVault {
    /// Open a vault at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &VaultPath) -> PathBuf {
        path.segments().fold(self.root.clone(), |acc, seg| acc.join(seg))
    }

    fn vault_path(&self, full: &Path) -> Option<VaultPath> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let segments: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        VaultPath::from_segments(segments).ok()
    }

    async fn ensure_parent(&self, path: &VaultPath) -> Result<(), VaultError> {
        if let Some(parent) = self.full(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VaultError::io_error(path.as_str(), e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl VaultStore for FsVault {
    async fn list_files(&self) -> Result<Vec<VaultPath>, VaultError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| VaultError::io_error(dir.display().to_string(), e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| VaultError::io_error(dir.display().to_string(), e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| VaultError::io_error(entry.path().display().to_string(), e))?;
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if file_type.is_dir() {
                    if !hidden {
                        pending.push(entry.path());
                    }
                } else if file_type.is_file() {
                    match self.vault_path(&entry.path()) {
                        Some(path) => files.push(path),
                        None => tracing::debug!("skipping non-vault path {}", entry.path().display()),
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn stat(&self, path: &VaultPath) -> Result<FileStat, VaultError> {
        let meta = tokio::fs::metadata(self.full(path))
            .await
            .map_err(|e| VaultError::io_error(path.as_str(), e))?;
        let modified = millis(meta.modified()).unwrap_or(0);
        Ok(FileStat {
            size: meta.len(),
            created: millis(meta.created()).unwrap_or(modified),
            modified,
        })
    }

    async fn read_binary(&self, path: &VaultPath) -> Result<Vec<u8>, VaultError> {
        tokio::fs::read(self.full(path))
            .await
            .map_err(|e| VaultError::io_error(path.as_str(), e))
    }

    async fn read_text(&self, path: &VaultPath) -> Result<String, VaultError> {
        let data = self.read_binary(path).await?;
        String::from_utf8(data).map_err(|_| VaultError::InvalidUtf8(path.clone()))
    }

    async fn write_text(&self, path: &VaultPath, content: &str) -> Result<(), VaultError> {
        self.write_binary(path, content.as_bytes()).await
    }

    async fn write_binary(&self, path: &VaultPath, data: &[u8]) -> Result<(), VaultError> {
        self.ensure_parent(path).await?;
        tokio::fs::write(self.full(path), data)
            .await
            .map_err(|e| VaultError::io_error(path.as_str(), e))
    }

    async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
        if self.exists(to).await {
            return Err(VaultError::AlreadyExists(to.clone()));
        }
        self.ensure_parent(to).await?;
        tokio::fs::rename(self.full(from), self.full(to))
            .await
            .map_err(|e| VaultError::io_error(from.as_str(), e))
    }

    async fn delete(&self, path: &VaultPath) -> Result<(), VaultError> {
        tokio::fs::remove_file(self.full(path))
            .await
            .map_err(|e| VaultError::io_error(path.as_str(), e))
    }

    async fn create_folder(&self, path: &VaultPath) -> Result<(), VaultError> {
        tokio::fs::create_dir_all(self.full(path))
            .await
            .map_err(|e| VaultError::io_error(path.as_str(), e))
    }

    async fn exists(&self, path: &VaultPath) -> bool {
        tokio::fs::try_exists(self.full(path)).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsVault::new(dir.path());

        vault.write_text(&p("notes/a.md"), "![[x.png]]").await.unwrap();
        vault.write_binary(&p("att/x.png"), &[1, 2, 3]).await.unwrap();
        vault.write_text(&p(".imgvault/cache.json"), "{}").await.unwrap();

        let files = vault.list_files().await.unwrap();
        assert_eq!(files, vec![p("att/x.png"), p("notes/a.md")]);

        let stat = vault.stat(&p("att/x.png")).await.unwrap();
        assert_eq!(stat.size, 3);
        assert_eq!(vault.read_text(&p(".imgvault/cache.json")).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.write_binary(&p("x.png"), &[9]).await.unwrap();

        vault.rename(&p("x.png"), &p("moved/y.png")).await.unwrap();
        assert!(!vault.exists(&p("x.png")).await);
        assert!(vault.exists(&p("moved/y.png")).await);

        vault.delete(&p("moved/y.png")).await.unwrap();
        let err = vault.delete(&p("moved/y.png")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rename_onto_existing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.write_binary(&p("a.png"), &[1]).await.unwrap();
        vault.write_binary(&p("b.png"), &[2]).await.unwrap();
        assert!(matches!(
            vault.rename(&p("a.png"), &p("b.png")).await,
            Err(VaultError::AlreadyExists(_))
        ));
    }
}
