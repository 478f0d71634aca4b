//! Settings consumed by the image manager
//!
//! Settings are read-only from the core's point of view. They are loaded
//! from TOML; every field has a default so a partial file is valid:
//!
//! ```toml
//! link_style = "markdown-relative"
//! hash_cache_path = ".imgvault/hash-cache.json"
//!
//! [orphans]
//! handling = "move-to-folder"
//! folder = "_orphans"
//!
//! [dedup]
//! enabled = true
//! ```

use imgvault_links::LinkStyle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default folder orphans are moved into
pub const DEFAULT_ORPHAN_FOLDER: &str = "_orphans";

/// Default vault-relative location of the hash cache
pub const DEFAULT_HASH_CACHE_PATH: &str = ".imgvault/hash-cache.json";

/// What a scan does with the orphans it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanHandling {
    /// Report only
    #[default]
    Keep,
    /// Relocate into the orphan folder
    MoveToFolder,
}

/// Orphan handling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrphanSettings {
    /// Action taken after a scan
    pub handling: OrphanHandling,
    /// Vault-relative folder for relocated orphans
    pub folder: String,
}

impl Default for OrphanSettings {
    fn default() -> Self {
        Self {
            handling: OrphanHandling::Keep,
            folder: DEFAULT_ORPHAN_FOLDER.to_string(),
        }
    }
}

/// Duplicate-paste settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Reuse an existing image when pasted bytes match it
    pub enabled: bool,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Image manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Syntax for embeds of newly placed images
    pub link_style: LinkStyle,
    /// Orphan handling
    pub orphans: OrphanSettings,
    /// Duplicate-paste handling
    pub dedup: DedupSettings,
    /// Vault-relative path of the persisted hash cache
    pub hash_cache_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            link_style: LinkStyle::default(),
            orphans: OrphanSettings::default(),
            dedup: DedupSettings::default(),
            hash_cache_path: DEFAULT_HASH_CACHE_PATH.to_string(),
        }
    }
}

impl Settings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With link style
    #[inline]
    #[must_use]
    pub fn with_link_style(mut self, style: LinkStyle) -> Self {
        self.link_style = style;
        self
    }

    /// With orphan handling
    #[inline]
    #[must_use]
    pub fn with_orphan_handling(mut self, handling: OrphanHandling) -> Self {
        self.orphans.handling = handling;
        self
    }

    /// With orphan folder
    #[inline]
    #[must_use]
    pub fn with_orphan_folder(mut self, folder: impl Into<String>) -> Self {
        self.orphans.folder = folder.into();
        self
    }

    /// With duplicate detection on or off
    #[inline]
    #[must_use]
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup.enabled = enabled;
        self
    }

    /// With hash cache location
    #[inline]
    #[must_use]
    pub fn with_hash_cache_path(mut self, path: impl Into<String>) -> Self {
        self.hash_cache_path = path.into();
        self
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the text is not valid settings TOML
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&text)?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// Errors loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML or has wrong values
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}
