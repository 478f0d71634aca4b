//! The vault file store seam
//!
//! [`VaultStore`] is everything the core needs from the host: listing,
//! reading, writing, renaming and deleting files. Hosts notify the core of
//! changes separately; stores never call back.

use crate::path::{PathError, VaultPath};
use async_trait::async_trait;

/// Filesystem-derived scalars for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes
    pub size: u64,
    /// Creation time, ms since the Unix epoch
    pub created: u64,
    /// Last modification time, ms since the Unix epoch
    pub modified: u64,
}

/// Host file storage
///
/// All methods may suspend. Implementations must fail cleanly (return an
/// error) when a file changed shape between calls.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Every file in the vault (folders excluded)
    async fn list_files(&self) -> Result<Vec<VaultPath>, VaultError>;

    /// Size and timestamps of one file
    async fn stat(&self, path: &VaultPath) -> Result<FileStat, VaultError>;

    /// Raw bytes of a file
    async fn read_binary(&self, path: &VaultPath) -> Result<Vec<u8>, VaultError>;

    /// UTF-8 text of a file
    async fn read_text(&self, path: &VaultPath) -> Result<String, VaultError>;

    /// Create or overwrite a text file
    async fn write_text(&self, path: &VaultPath, content: &str) -> Result<(), VaultError>;

    /// Create or overwrite a binary file
    async fn write_binary(&self, path: &VaultPath, data: &[u8]) -> Result<(), VaultError>;

    /// Move a file; fails if `to` already exists
    async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError>;

    /// Delete a file
    async fn delete(&self, path: &VaultPath) -> Result<(), VaultError>;

    /// Create a folder and any missing parents
    async fn create_folder(&self, path: &VaultPath) -> Result<(), VaultError>;

    /// Whether a file or folder exists
    async fn exists(&self, path: &VaultPath) -> bool;

    /// Every image file, sorted by path
    async fn list_images(&self) -> Result<Vec<VaultPath>, VaultError> {
        let mut images: Vec<_> = self
            .list_files()
            .await?
            .into_iter()
            .filter(VaultPath::is_image)
            .collect();
        images.sort();
        Ok(images)
    }

    /// Every note file, sorted by path
    async fn list_notes(&self) -> Result<Vec<VaultPath>, VaultError> {
        let mut notes: Vec<_> = self
            .list_files()
            .await?
            .into_iter()
            .filter(VaultPath::is_note)
            .collect();
        notes.sort();
        Ok(notes)
    }

    /// `wanted` if free, otherwise the first free `<stem>-N.<ext>` beside it
    async fn free_path(&self, wanted: &VaultPath) -> Result<VaultPath, PathError> {
        let mut candidate = wanted.clone();
        let mut n = 1u32;
        while self.exists(&candidate).await {
            let name = match wanted.extension() {
                Some(ext) => format!("{}-{n}.{ext}", wanted.stem()),
                None => format!("{}-{n}", wanted.stem()),
            };
            candidate = wanted.with_name(&name)?;
            n += 1;
        }
        Ok(candidate)
    }
}

/// Errors returned by [`VaultStore`] implementations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No file at the path
    #[error("not found: {0}")]
    NotFound(VaultPath),

    /// Destination of a write or rename is taken
    #[error("already exists: {0}")]
    AlreadyExists(VaultPath),

    /// File content is not UTF-8
    #[error("not valid utf-8: {0}")]
    InvalidUtf8(VaultPath),

    /// Underlying IO failure
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Host produced a path that is not a vault path
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
}

impl VaultError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the file is gone
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
