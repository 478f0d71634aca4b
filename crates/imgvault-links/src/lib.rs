//! imgvault link rewriting
//!
//! When an image moves, every note embedding it is rewritten to point at
//! the new location.
//!
//! # Overview
//!
//! - **transforms**: one pure function per link form (wiki path, wiki bare
//!   name, markdown from the root, markdown relative to the note)
//! - **LinkRewriter**: reads, rewrites and writes back the affected notes
//! - **render_embed**: embed text for a newly placed image in a [`LinkStyle`]
//!
//! # Example
//!
//! ```rust
//! use imgvault_index::LinkResolver;
//! use imgvault_links::transforms::{rewrite_note, Move};
//! use imgvault_vault::VaultPath;
//!
//! let old = VaultPath::parse("a/b/img/x.png").unwrap();
//! let new = VaultPath::parse("c/x.png").unwrap();
//! let note = VaultPath::parse("a/b/note.md").unwrap();
//! let resolver = LinkResolver::from_images([old.clone()]);
//!
//! let mv = Move { old: &old, new: &new, note: &note, resolver: &resolver };
//! assert_eq!(rewrite_note("![](./img/x.png)", mv), "![](../../c/x.png)");
//! ```

#![warn(missing_docs)]

mod render;
mod rewriter;
pub mod transforms;

pub use render::{render_embed, LinkStyle};
pub use rewriter::{BatchReport, LinkRewriter, RewriteReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
