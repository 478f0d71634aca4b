//! imgvault reference index
//!
//! Answers "which notes embed image X" and "which images does note Y
//! embed" from note text.
//!
//! # Overview
//!
//! - **syntax**: wiki (`![[x.png]]`) and markdown (`![](x.png)`) embed
//!   recognition, skipping code
//! - **LinkResolver**: the single authority mapping a link in a note onto
//!   an image path
//! - **ReferenceIndex**: forward and inverse maps, maintained incrementally
//!
//! # Example
//!
//! ```rust
//! use imgvault_index::ReferenceIndex;
//! use imgvault_vault::VaultPath;
//!
//! let image = VaultPath::parse("img/cat.png").unwrap();
//! let note = VaultPath::parse("daily.md").unwrap();
//! let index = ReferenceIndex::from_snapshot(
//!     [image.clone()],
//!     [(note.clone(), "Look: ![[cat.png]]".to_string())],
//! );
//! assert!(index.notes_referencing(&image).contains(&note));
//! ```

#![warn(missing_docs)]

mod index;
mod resolver;
pub mod syntax;

pub use index::{IndexError, ReferenceIndex};
pub use resolver::LinkResolver;
pub use syntax::{parse_embeds, Embed, EmbedSyntax};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
