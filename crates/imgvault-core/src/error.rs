//! Error types for the image manager

use crate::config::ConfigError;
use imgvault_hash::CacheError;
use imgvault_index::IndexError;
use imgvault_vault::{PathError, VaultError, VaultPath};

/// Main manager error type
///
/// Only whole-operation failures surface here. Per-item failures inside
/// batches are logged and reflected in counts instead.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Vault operation failed
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Index could not be built
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Hash cache could not be saved
    #[error("hash cache error: {0}")]
    Cache(#[from] CacheError),

    /// Settings could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A path had an invalid shape
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// An image operation was given a non-image path
    #[error("not an image: {0}")]
    NotAnImage(VaultPath),

    /// A note operation was given a non-note path
    #[error("not a note: {0}")]
    NotANote(VaultPath),
}
