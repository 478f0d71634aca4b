//! Link rewriting across the vault
//!
//! [`LinkRewriter`] finds the notes that embed a moved image, rewrites their
//! text with the pure transforms, and writes back only what changed. A note
//! that fails to load or save is logged and skipped; the rest carry on.

use crate::transforms::{rewrite_note, Move};
use imgvault_index::ReferenceIndex;
use imgvault_vault::{VaultPath, VaultStore};
use std::collections::BTreeSet;

/// Notes rewritten for one `(old, new)` move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Each note written, with the content it now holds
    pub updated: Vec<(VaultPath, String)>,
}

impl RewriteReport {
    /// Number of notes actually written
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.updated.len()
    }
}

/// Outcome of a sequence of moves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Notes written, summed over every move
    pub updated: usize,
    /// Images whose reference counts may have changed
    pub touched: BTreeSet<VaultPath>,
}

/// Rewrites embeds when images move
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkRewriter;

impl LinkRewriter {
    /// Create rewriter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rewrite every note that embeds `old` so it embeds `new`
    ///
    /// `index` must still describe the vault from before the move. Failures
    /// on individual notes are logged and leave those notes out of the
    /// report.
    pub async fn rewrite(
        &self,
        vault: &dyn VaultStore,
        index: &ReferenceIndex,
        old: &VaultPath,
        new: &VaultPath,
    ) -> RewriteReport {
        let mut report = RewriteReport::default();

        for note in index.notes_referencing(old) {
            let content = match vault.read_text(note).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("cannot read {note} to rewrite links to {old}: {e}");
                    continue;
                }
            };

            let mv = Move {
                old,
                new,
                note,
                resolver: index.resolver(),
            };
            let rewritten = rewrite_note(&content, mv);
            if rewritten == content {
                tracing::debug!("{note} references {old} but no link text changed");
                continue;
            }

            match vault.write_text(note, &rewritten).await {
                Ok(()) => report.updated.push((note.clone(), rewritten)),
                Err(e) => tracing::warn!("cannot write {note} after rewriting links to {old}: {e}"),
            }
        }

        tracing::info!("{old} -> {new}: updated links in {} notes", report.count());
        report
    }

    /// Move the index past one rewrite: the image is renamed and every
    /// rewritten note is re-indexed from its new content
    pub fn commit(
        index: &mut ReferenceIndex,
        old: &VaultPath,
        new: &VaultPath,
        report: &RewriteReport,
    ) -> BTreeSet<VaultPath> {
        let mut touched = index.rename_image(old, new);
        for (note, content) in &report.updated {
            touched.extend(index.upsert_note(note, content));
        }
        touched
    }

    /// Apply moves in order, advancing the index after each
    ///
    /// Files are expected to already be at their new paths. There is no
    /// atomicity across the batch: each move's rewrites stand on their own.
    pub async fn rewrite_batch(
        &self,
        vault: &dyn VaultStore,
        index: &mut ReferenceIndex,
        moves: &[(VaultPath, VaultPath)],
    ) -> BatchReport {
        let mut batch = BatchReport::default();
        for (old, new) in moves {
            let report = self.rewrite(vault, index, old, new).await;
            batch.updated += report.count();
            batch.touched.extend(Self::commit(index, old, new, &report));
        }
        batch
    }
}
