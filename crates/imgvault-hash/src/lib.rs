//! imgvault hashing
//!
//! Content addressing for duplicate-paste detection.
//!
//! # Overview
//!
//! - **ContentDigest**: 8-byte BLAKE3 prefix of the file bytes
//! - **HashCache**: persisted path → `{hash, mtime}` map, trusted only while
//!   the mtime still matches
//! - **HashService**: duplicate search and full rebuilds over a vault
//!
//! # Example
//!
//! ```rust
//! use imgvault_hash::HashService;
//!
//! let a = HashService::hash_of(b"pixels");
//! assert_eq!(a, HashService::hash_of(b"pixels"));
//! assert_eq!(a.to_string().len(), 16);
//! ```

#![warn(missing_docs)]

mod cache;
mod digest;
mod service;

pub use cache::{CacheError, HashCache, HashCacheEntry};
pub use digest::{ContentDigest, HashError, DIGEST_LEN};
pub use service::{HashService, RebuildOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
