//! imgvault image manager
//!
//! Ties the reference index, link rewriter, orphan tracker and hash
//! service together behind one owner of state.
//!
//! # Example
//!
//! ```rust
//! use imgvault_core::{ImageManager, Settings, VaultEvent};
//! use imgvault_vault::{MemoryVault, VaultPath};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let vault = MemoryVault::new();
//! let image = VaultPath::parse("cat.png").unwrap();
//! vault.insert(&image, vec![1, 2, 3]);
//!
//! let mut manager = ImageManager::open(vault, Settings::new()).await.unwrap();
//! assert!(manager.orphans().contains(&image));
//!
//! let note = VaultPath::parse("n.md").unwrap();
//! manager.vault().insert(&note, "![[cat.png]]");
//! manager.handle(&VaultEvent::Created { path: note }).await;
//! assert!(manager.orphans().is_empty());
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod events;
mod info;
mod manager;

pub use config::{ConfigError, DedupSettings, OrphanHandling, OrphanSettings, Settings};
pub use error::ManagerError;
pub use events::{route, Route, VaultEvent};
pub use info::ImageInfo;
pub use manager::{ImageManager, PastedImage};

pub use imgvault_hash::{ContentDigest, RebuildOutcome};
pub use imgvault_links::LinkStyle;
pub use imgvault_orphans::ScanOutcome;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
