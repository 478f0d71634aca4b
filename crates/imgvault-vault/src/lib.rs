//! imgvault vault foundation
//!
//! Paths, the host file-store seam and scan supersession shared by every
//! other imgvault crate.
//!
//! # Core Concepts
//!
//! - [`VaultPath`]: validated vault-relative path with relative-link arithmetic
//! - [`VaultStore`]: async trait over the host's file storage
//! - [`MemoryVault`] / [`FsVault`]: in-memory and on-disk stores
//! - [`ScanGate`]: latest-scan-wins supersession for long scans
//!
//! # Example
//!
//! ```rust
//! use imgvault_vault::VaultPath;
//!
//! let image = VaultPath::parse("c/x.png").unwrap();
//! assert_eq!(image.relative_from("a/b"), "../../c/x.png");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod fs;
mod memory;
mod path;
mod scan;
mod store;

pub use fs::FsVault;
pub use memory::MemoryVault;
pub use path::{resolve_relative, PathError, VaultPath, IMAGE_EXTENSIONS, NOTE_EXTENSION};
pub use scan::{ScanGate, ScanTicket};
pub use store::{FileStat, VaultError, VaultStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
