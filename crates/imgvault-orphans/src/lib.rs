//! imgvault orphan tracking
//!
//! An orphan is an image no note embeds. [`OrphanTracker`] keeps the set of
//! orphans in step with a [`imgvault_index::ReferenceIndex`] and carries out
//! bulk delete and move requests on them.

#![warn(missing_docs)]

mod tracker;

pub use tracker::{DeleteOutcome, OrphanTracker, ScanOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
