//! Orphan set maintenance
//!
//! The set is a cache over the reference index: [`OrphanTracker::scan`]
//! recomputes it from scratch, [`OrphanTracker::refresh`] patches it after
//! an index mutation, and [`OrphanTracker::is_orphan`] never answers from
//! the cache alone.

use imgvault_index::ReferenceIndex;
use imgvault_vault::{ScanGate, VaultError, VaultPath, VaultStore};
use std::collections::BTreeSet;

/// Result of a full scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The set was replaced with these orphans
    Completed(BTreeSet<VaultPath>),
    /// A newer scan started; this one's result was discarded
    Superseded,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Paths actually deleted
    pub deleted: Vec<VaultPath>,
}

impl DeleteOutcome {
    /// Number of files deleted
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.deleted.len()
    }
}

/// Live set of images with no referencing notes
#[derive(Debug, Default)]
pub struct OrphanTracker {
    orphans: BTreeSet<VaultPath>,
    gate: ScanGate,
}

impl OrphanTracker {
    /// Create tracker with an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current orphan set
    #[inline]
    #[must_use]
    pub fn orphans(&self) -> &BTreeSet<VaultPath> {
        &self.orphans
    }

    /// Handle for superseding an in-flight scan
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &ScanGate {
        &self.gate
    }

    /// Recompute the set from every image in the vault
    ///
    /// The index's image catalog is first brought in line with the vault:
    /// images it has missed are added and images that are gone are dropped.
    /// The previous set is replaced, not merged. If another scan begins
    /// before this one finishes, the result is dropped and the index is
    /// left alone.
    ///
    /// # Errors
    /// Returns [`VaultError`] if the vault cannot be listed
    pub async fn scan(&mut self, vault: &dyn VaultStore, index: &mut ReferenceIndex) -> Result<ScanOutcome, VaultError> {
        let ticket = self.gate.begin();
        let images: BTreeSet<VaultPath> = vault.list_images().await?.into_iter().collect();

        if ticket.is_superseded() {
            tracing::info!("orphan scan {} superseded, discarding", ticket.generation());
            return Ok(ScanOutcome::Superseded);
        }

        let drift = reconcile(index, &images);
        if drift > 0 {
            tracing::info!("orphan scan {} found {drift} images the index had drifted on", ticket.generation());
        }

        let found: BTreeSet<VaultPath> = images
            .into_iter()
            .filter(|image| index.reference_count(image) == 0)
            .collect();

        tracing::info!("orphan scan {} found {} orphans", ticket.generation(), found.len());
        self.orphans.clone_from(&found);
        Ok(ScanOutcome::Completed(found))
    }

    /// Whether `path` is an orphan, checked against the index
    ///
    /// The cached set is corrected if it disagreed.
    pub fn is_orphan(&mut self, path: &VaultPath, index: &ReferenceIndex) -> bool {
        let actual = Self::orphaned_in(path, index);
        if actual != self.orphans.contains(path) {
            tracing::debug!("orphan cache for {path} was stale, now {actual}");
        }
        self.set(path, actual);
        actual
    }

    /// Re-evaluate images an index mutation reported as touched
    pub fn refresh(&mut self, touched: &BTreeSet<VaultPath>, index: &ReferenceIndex) {
        for path in touched {
            self.set(path, Self::orphaned_in(path, index));
        }
    }

    /// Delete files that still exist, best-effort
    ///
    /// Paths are not re-checked for references. A path with no file behind
    /// it is dropped from the set but not counted.
    pub async fn delete_orphans(&mut self, vault: &dyn VaultStore, paths: &[VaultPath]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for path in paths {
            if !vault.exists(path).await {
                tracing::debug!("{path} already gone, nothing to delete");
                self.orphans.remove(path);
                continue;
            }
            match vault.delete(path).await {
                Ok(()) => {
                    self.orphans.remove(path);
                    outcome.deleted.push(path.clone());
                }
                Err(e) => tracing::warn!("failed to delete orphan {path}: {e}"),
            }
        }
        tracing::info!("deleted {} of {} orphans", outcome.count(), paths.len());
        outcome
    }

    /// Move files into `folder`, suffixing names that are already taken
    ///
    /// Returns the `(from, to)` pairs that succeeded; each is still an
    /// orphan, now under its new path.
    pub async fn move_to_orphan_folder(
        &mut self,
        vault: &dyn VaultStore,
        folder: &VaultPath,
        paths: &[VaultPath],
    ) -> Vec<(VaultPath, VaultPath)> {
        if !vault.exists(folder).await {
            if let Err(e) = vault.create_folder(folder).await {
                tracing::warn!("cannot create orphan folder {folder}: {e}");
            }
        }

        let mut moved = Vec::new();
        for path in paths {
            let destination = match folder.join(path.name()) {
                Ok(wanted) => vault.free_path(&wanted).await,
                Err(e) => Err(e),
            };
            let destination = match destination {
                Ok(destination) => destination,
                Err(e) => {
                    tracing::warn!("no destination for {path} in {folder}: {e}");
                    continue;
                }
            };
            match vault.rename(path, &destination).await {
                Ok(()) => {
                    if self.orphans.remove(path) {
                        self.orphans.insert(destination.clone());
                    }
                    moved.push((path.clone(), destination));
                }
                Err(e) => tracing::warn!("failed to move orphan {path}: {e}"),
            }
        }
        tracing::info!("moved {} of {} orphans to {folder}", moved.len(), paths.len());
        moved
    }

    fn orphaned_in(path: &VaultPath, index: &ReferenceIndex) -> bool {
        index.contains_image(path) && index.reference_count(path) == 0
    }

    fn set(&mut self, path: &VaultPath, orphan: bool) {
        if orphan {
            self.orphans.insert(path.clone());
        } else {
            self.orphans.remove(path);
        }
    }
}

/// Make the index's image catalog match `listed`; returns how many images
/// were added or dropped
fn reconcile(index: &mut ReferenceIndex, listed: &BTreeSet<VaultPath>) -> usize {
    let gone: Vec<VaultPath> = index.images().filter(|image| !listed.contains(*image)).cloned().collect();
    for image in &gone {
        index.remove_image(image);
    }
    let mut added = 0;
    for image in listed {
        if !index.contains_image(image) {
            index.insert_image(image);
            added += 1;
        }
    }
    gone.len() + added
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use imgvault_vault::{FileStat, MemoryVault};

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    async fn vault_with(images: &[&str], notes: &[(&str, &str)]) -> (MemoryVault, ReferenceIndex) {
        let vault = MemoryVault::new();
        for image in images {
            vault.insert(&p(image), vec![0]);
        }
        for (note, content) in notes {
            vault.insert(&p(note), *content);
        }
        let index = ReferenceIndex::build(&vault).await.unwrap();
        (vault, index)
    }

    #[tokio::test]
    async fn scan_replaces_previous_set() {
        let (vault, mut index) = vault_with(&["a.png", "b.png"], &[("n.md", "![[a.png]]")]).await;
        let mut tracker = OrphanTracker::new();
        tracker.orphans.insert(p("stale.png"));

        let outcome = tracker.scan(&vault, &mut index).await.unwrap();
        let expected: BTreeSet<_> = [p("b.png")].into();
        assert_eq!(outcome, ScanOutcome::Completed(expected.clone()));
        assert_eq!(tracker.orphans(), &expected);
    }

    #[tokio::test]
    async fn is_orphan_corrects_cache() {
        let (_vault, index) = vault_with(&["a.png"], &[("n.md", "![[a.png]]")]).await;
        let mut tracker = OrphanTracker::new();
        tracker.orphans.insert(p("a.png"));

        assert!(!tracker.is_orphan(&p("a.png"), &index));
        assert!(tracker.orphans().is_empty());
        assert!(!tracker.is_orphan(&p("unknown.png"), &index));
    }

    #[tokio::test]
    async fn refresh_after_note_delete() {
        let (_vault, mut index) = vault_with(&["a.png"], &[("n.md", "![[a.png]]")]).await;
        let mut tracker = OrphanTracker::new();

        let touched = index.remove_note(&p("n.md"));
        tracker.refresh(&touched, &index);
        assert!(tracker.orphans().contains(&p("a.png")));
    }

    #[tokio::test]
    async fn delete_counts_only_existing_files() {
        let (vault, mut index) = vault_with(&["a.png", "b.png"], &[]).await;
        let mut tracker = OrphanTracker::new();
        tracker.scan(&vault, &mut index).await.unwrap();

        let paths = [p("a.png"), p("b.png"), p("never.png")];
        let outcome = tracker.delete_orphans(&vault, &paths).await;
        assert_eq!(outcome.count(), 2);
        for path in &paths {
            assert!(!tracker.orphans().contains(path));
        }
    }

    #[tokio::test]
    async fn delete_failure_is_skipped() {
        let (vault, mut index) = vault_with(&["a.png", "b.png"], &[]).await;
        vault.fail_deletes_of(&p("a.png"));
        let mut tracker = OrphanTracker::new();
        tracker.scan(&vault, &mut index).await.unwrap();

        let outcome = tracker.delete_orphans(&vault, &[p("a.png"), p("b.png")]).await;
        assert_eq!(outcome.deleted, vec![p("b.png")]);
        assert!(tracker.orphans().contains(&p("a.png")));
    }

    #[tokio::test]
    async fn move_suffixes_collisions() {
        let (vault, mut index) = vault_with(&["x.png", "d/x.png", "_orphans/x.png", "bad.png"], &[]).await;
        vault.fail_renames_of(&p("bad.png"));
        let mut tracker = OrphanTracker::new();
        tracker.scan(&vault, &mut index).await.unwrap();

        let moved = tracker
            .move_to_orphan_folder(&vault, &p("_orphans"), &[p("x.png"), p("bad.png"), p("d/x.png")])
            .await;
        assert_eq!(
            moved,
            vec![(p("x.png"), p("_orphans/x-1.png")), (p("d/x.png"), p("_orphans/x-2.png"))]
        );
        assert!(tracker.orphans().contains(&p("_orphans/x-2.png")));
        assert!(!tracker.orphans().contains(&p("x.png")));
        assert!(vault.contents(&p("bad.png")).is_some());
    }

    #[tokio::test]
    async fn move_creates_missing_folder() {
        let (vault, mut index) = vault_with(&["x.png"], &[]).await;
        let mut tracker = OrphanTracker::new();
        tracker.scan(&vault, &mut index).await.unwrap();

        let moved = tracker.move_to_orphan_folder(&vault, &p("old/stuff"), &[p("x.png")]).await;
        assert_eq!(moved, vec![(p("x.png"), p("old/stuff/x.png"))]);
        assert!(vault.exists(&p("old/stuff")).await);
    }

    /// Store that starts a competing scan while being listed
    struct Interrupting {
        inner: MemoryVault,
        gate: ScanGate,
    }

    #[async_trait]
    impl VaultStore for Interrupting {
        async fn list_files(&self) -> Result<Vec<VaultPath>, VaultError> {
            self.gate.cancel_all();
            self.inner.list_files().await
        }
        async fn stat(&self, path: &VaultPath) -> Result<FileStat, VaultError> {
            self.inner.stat(path).await
        }
        async fn read_binary(&self, path: &VaultPath) -> Result<Vec<u8>, VaultError> {
            self.inner.read_binary(path).await
        }
        async fn read_text(&self, path: &VaultPath) -> Result<String, VaultError> {
            self.inner.read_text(path).await
        }
        async fn write_text(&self, path: &VaultPath, content: &str) -> Result<(), VaultError> {
            self.inner.write_text(path, content).await
        }
        async fn write_binary(&self, path: &VaultPath, data: &[u8]) -> Result<(), VaultError> {
            self.inner.write_binary(path, data).await
        }
        async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
            self.inner.rename(from, to).await
        }
        async fn delete(&self, path: &VaultPath) -> Result<(), VaultError> {
            self.inner.delete(path).await
        }
        async fn create_folder(&self, path: &VaultPath) -> Result<(), VaultError> {
            self.inner.create_folder(path).await
        }
        async fn exists(&self, path: &VaultPath) -> bool {
            self.inner.exists(path).await
        }
    }

    #[tokio::test]
    async fn superseded_scan_leaves_set_untouched() {
        let mut tracker = OrphanTracker::new();
        tracker.orphans.insert(p("kept.png"));

        let vault = Interrupting {
            inner: MemoryVault::new(),
            gate: tracker.gate().clone(),
        };
        vault.inner.insert(&p("new.png"), vec![0]);
        let mut index = ReferenceIndex::from_snapshot([p("new.png")], Vec::<(VaultPath, String)>::new());

        let outcome = tracker.scan(&vault, &mut index).await.unwrap();
        assert_eq!(outcome, ScanOutcome::Superseded);
        assert!(tracker.orphans().contains(&p("kept.png")));
        assert!(!tracker.orphans().contains(&p("new.png")));
    }

    #[tokio::test]
    async fn scan_brings_index_catalog_in_line_with_vault() {
        let (vault, mut index) = vault_with(&["gone.png"], &[("n.md", "![[late.png]]")]).await;
        vault.delete(&p("gone.png")).await.unwrap();
        vault.insert(&p("late.png"), vec![0]);
        vault.insert(&p("loose.png"), vec![0]);
        let mut tracker = OrphanTracker::new();

        let outcome = tracker.scan(&vault, &mut index).await.unwrap();
        let expected: BTreeSet<_> = [p("loose.png")].into();
        assert_eq!(outcome, ScanOutcome::Completed(expected));
        assert!(!index.contains_image(&p("gone.png")));
        assert_eq!(index.reference_count(&p("late.png")), 1);
        assert!(!tracker.is_orphan(&p("late.png"), &index));
    }
}
