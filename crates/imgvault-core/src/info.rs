//! Aggregate per-image view

use chrono::{DateTime, Utc};
use imgvault_hash::ContentDigest;
use imgvault_vault::VaultPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything known about one image, assembled per query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Vault-relative path
    pub path: VaultPath,
    /// File name with extension
    pub name: String,
    /// Lower-cased extension
    pub extension: String,
    /// Size in bytes
    pub size: u64,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Digest, if a valid one is cached for the current mtime
    pub hash: Option<ContentDigest>,
    /// Notes embedding this image
    pub referenced_by: BTreeSet<VaultPath>,
    /// No note embeds this image
    pub is_orphan: bool,
}

/// Millisecond timestamp as a UTC time, clamping out-of-range values
pub(crate) fn timestamp(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}
