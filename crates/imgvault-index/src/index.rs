//! Note ↔ image reference index
//!
//! [`ReferenceIndex`] keeps the forward map (note → embedded images) and its
//! inverse (image → referencing notes) in step. Every mutation returns the
//! images whose reference count may have changed so callers can refresh
//! derived state synchronously.

use crate::resolver::LinkResolver;
use crate::syntax::{link_file_name, parse_embeds};
use imgvault_vault::{VaultError, VaultPath, VaultStore};
use std::collections::{BTreeMap, BTreeSet};

static EMPTY: BTreeSet<VaultPath> = BTreeSet::new();

/// Forward and inverse embed maps over a vault
///
/// Besides the resolved maps the index keeps each note's raw links and a
/// lookup from link file name to notes. When an image appears, disappears
/// or moves, only the notes whose links carry that file name can change
/// target, and exactly those are re-resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    resolver: LinkResolver,
    /// note -> links as written (decoded)
    links: BTreeMap<VaultPath, Vec<String>>,
    /// lower-cased link file name -> notes using it
    by_link_name: BTreeMap<String, BTreeSet<VaultPath>>,
    forward: BTreeMap<VaultPath, BTreeSet<VaultPath>>,
    inverse: BTreeMap<VaultPath, BTreeSet<VaultPath>>,
}

impl ReferenceIndex {
    /// Create an empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from known images and note contents
    pub fn from_snapshot<I, N>(images: I, notes: N) -> Self
    where
        I: IntoIterator<Item = VaultPath>,
        N: IntoIterator<Item = (VaultPath, String)>,
    {
        let mut index = Self {
            resolver: LinkResolver::from_images(images),
            ..Self::default()
        };
        for (note, content) in notes {
            index.upsert_note(&note, &content);
        }
        index
    }

    /// Read every note in the vault and build the index
    ///
    /// Notes that cannot be read are skipped with a warning.
    ///
    /// # Errors
    /// Returns [`IndexError::Vault`] if the vault cannot be listed
    pub async fn build(vault: &dyn VaultStore) -> Result<Self, IndexError> {
        let files = vault.list_files().await?;
        let images = files.iter().filter(|path| path.is_image()).cloned();

        let mut notes = Vec::new();
        for note in files.iter().filter(|path| path.is_note()) {
            match vault.read_text(note).await {
                Ok(content) => notes.push((note.clone(), content)),
                Err(e) => tracing::warn!("skipping unreadable note {note}: {e}"),
            }
        }

        let index = Self::from_snapshot(images, notes);
        tracing::info!(
            "indexed {} notes, {} images, {} referenced",
            index.links.len(),
            index.resolver.len(),
            index.inverse.len()
        );
        Ok(index)
    }

    /// The resolver shared with the link rewriter
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Notes embedding `image`
    #[must_use]
    pub fn notes_referencing(&self, image: &VaultPath) -> &BTreeSet<VaultPath> {
        self.inverse.get(image).unwrap_or(&EMPTY)
    }

    /// Images embedded by `note`
    #[must_use]
    pub fn images_embedded_by(&self, note: &VaultPath) -> &BTreeSet<VaultPath> {
        self.forward.get(note).unwrap_or(&EMPTY)
    }

    /// Number of notes embedding `image`
    #[inline]
    #[must_use]
    pub fn reference_count(&self, image: &VaultPath) -> usize {
        self.inverse.get(image).map_or(0, BTreeSet::len)
    }

    /// Whether `image` is a known image
    #[inline]
    #[must_use]
    pub fn contains_image(&self, image: &VaultPath) -> bool {
        self.resolver.contains(image)
    }

    /// Whether `note` has been indexed
    #[inline]
    #[must_use]
    pub fn contains_note(&self, note: &VaultPath) -> bool {
        self.links.contains_key(note)
    }

    /// Known images in path order
    pub fn images(&self) -> impl Iterator<Item = &VaultPath> {
        self.resolver.images()
    }

    /// Indexed notes in path order
    pub fn notes(&self) -> impl Iterator<Item = &VaultPath> {
        self.links.keys()
    }

    /// Embed links of `note` as written
    #[must_use]
    pub fn links_of(&self, note: &VaultPath) -> &[String] {
        self.links.get(note).map(Vec::as_slice).unwrap_or_default()
    }

    /// Index (or re-index) a note from its content
    pub fn upsert_note(&mut self, note: &VaultPath, content: &str) -> BTreeSet<VaultPath> {
        let links: Vec<String> = parse_embeds(content).into_iter().map(|e| e.link).collect();
        self.unregister_links(note);
        self.register_links(note, links);
        self.reresolve(note)
    }

    /// Drop a deleted note
    pub fn remove_note(&mut self, note: &VaultPath) -> BTreeSet<VaultPath> {
        self.unregister_links(note);
        self.set_forward(note, BTreeSet::new())
    }

    /// Follow a note move; its relative links are re-resolved from the new folder
    ///
    /// Renaming a note the index does not know is a no-op.
    pub fn rename_note(&mut self, from: &VaultPath, to: &VaultPath) -> BTreeSet<VaultPath> {
        let Some(links) = self.unregister_links(from) else {
            return BTreeSet::new();
        };
        let mut touched = self.set_forward(from, BTreeSet::new());
        self.unregister_links(to);
        self.register_links(to, links);
        touched.extend(self.reresolve(to));
        touched
    }

    /// Add an image and re-resolve notes whose links name it
    pub fn insert_image(&mut self, image: &VaultPath) -> BTreeSet<VaultPath> {
        if !self.resolver.insert(image.clone()) {
            return BTreeSet::new();
        }
        let mut touched = self.reresolve_name(image.name());
        touched.insert(image.clone());
        touched
    }

    /// Remove an image and re-resolve notes whose links named it
    pub fn remove_image(&mut self, image: &VaultPath) -> BTreeSet<VaultPath> {
        if !self.resolver.remove(image) {
            return BTreeSet::new();
        }
        let mut touched = self.reresolve_name(image.name());
        touched.insert(image.clone());
        touched
    }

    /// Follow an image move
    ///
    /// Applying the same move twice is a no-op the second time.
    pub fn rename_image(&mut self, from: &VaultPath, to: &VaultPath) -> BTreeSet<VaultPath> {
        let removed = self.resolver.remove(from);
        let inserted = self.resolver.insert(to.clone());
        if !removed && !inserted {
            return BTreeSet::new();
        }
        let mut touched = self.reresolve_name(from.name());
        if !from.name().eq_ignore_ascii_case(to.name()) {
            touched.extend(self.reresolve_name(to.name()));
        }
        touched.insert(from.clone());
        touched.insert(to.clone());
        touched
    }

    /// Check that the inverse map is exactly the transpose of the forward map
    ///
    /// # Errors
    /// Returns [`IndexError::TransposeMismatch`] naming the first image whose
    /// inverse entry disagrees
    pub fn verify_transpose(&self) -> Result<(), IndexError> {
        let mut transpose: BTreeMap<&VaultPath, BTreeSet<&VaultPath>> = BTreeMap::new();
        for (note, images) in &self.forward {
            for image in images {
                transpose.entry(image).or_default().insert(note);
            }
        }

        let images: BTreeSet<&VaultPath> = transpose.keys().copied().chain(self.inverse.keys()).collect();
        for image in images {
            let expected = transpose.get(image);
            let actual = self.inverse.get(image);
            let same = match (expected, actual) {
                (Some(expected), Some(actual)) => expected.iter().copied().eq(actual.iter()),
                _ => false,
            };
            if !same {
                return Err(IndexError::TransposeMismatch { image: image.clone() });
            }
        }
        Ok(())
    }

    fn register_links(&mut self, note: &VaultPath, links: Vec<String>) {
        for link in &links {
            self.by_link_name
                .entry(link_file_name(link))
                .or_default()
                .insert(note.clone());
        }
        self.links.insert(note.clone(), links);
    }

    fn unregister_links(&mut self, note: &VaultPath) -> Option<Vec<String>> {
        let links = self.links.remove(note)?;
        for link in &links {
            let key = link_file_name(link);
            if let Some(notes) = self.by_link_name.get_mut(&key) {
                notes.remove(note);
                if notes.is_empty() {
                    self.by_link_name.remove(&key);
                }
            }
        }
        Some(links)
    }

    fn reresolve_name(&mut self, name: &str) -> BTreeSet<VaultPath> {
        let notes: Vec<VaultPath> = self
            .by_link_name
            .get(&name.to_lowercase())
            .map(|notes| notes.iter().cloned().collect())
            .unwrap_or_default();
        let mut touched = BTreeSet::new();
        for note in notes {
            touched.extend(self.reresolve(&note));
        }
        touched
    }

    fn reresolve(&mut self, note: &VaultPath) -> BTreeSet<VaultPath> {
        let images: BTreeSet<VaultPath> = self
            .links_of(note)
            .iter()
            .filter_map(|link| self.resolver.resolve(note, link))
            .collect();
        self.set_forward(note, images)
    }

    /// Replace a note's forward entry, patching the inverse map
    fn set_forward(&mut self, note: &VaultPath, images: BTreeSet<VaultPath>) -> BTreeSet<VaultPath> {
        let old = self.forward.remove(note).unwrap_or_default();

        for image in old.difference(&images) {
            if let Some(notes) = self.inverse.get_mut(image) {
                notes.remove(note);
                if notes.is_empty() {
                    self.inverse.remove(image);
                }
            }
        }
        for image in images.difference(&old) {
            self.inverse.entry(image.clone()).or_default().insert(note.clone());
        }

        let touched = old.symmetric_difference(&images).cloned().collect();
        if !images.is_empty() {
            self.forward.insert(note.clone(), images);
        }
        touched
    }
}

/// Errors raised by the reference index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The vault could not be listed
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Inverse map drifted from the forward map
    #[error("inverse entry for {image} is not the transpose of the forward map")]
    TransposeMismatch {
        /// First image found inconsistent
        image: VaultPath,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgvault_vault::MemoryVault;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    fn set(paths: &[&str]) -> BTreeSet<VaultPath> {
        paths.iter().map(|s| p(s)).collect()
    }

    fn index(images: &[&str], notes: &[(&str, &str)]) -> ReferenceIndex {
        ReferenceIndex::from_snapshot(
            images.iter().map(|s| p(s)),
            notes.iter().map(|(n, c)| (p(n), (*c).to_string())),
        )
    }

    #[test]
    fn forward_and_inverse() {
        let idx = index(
            &["img/a.png", "img/b.png", "c.png"],
            &[("n1.md", "![[a.png]] ![](img/b.png)"), ("d/n2.md", "![[a.png]]")],
        );
        assert_eq!(idx.images_embedded_by(&p("n1.md")), &set(&["img/a.png", "img/b.png"]));
        assert_eq!(idx.notes_referencing(&p("img/a.png")), &set(&["d/n2.md", "n1.md"]));
        assert_eq!(idx.reference_count(&p("c.png")), 0);
        assert!(idx.verify_transpose().is_ok());
    }

    #[test]
    fn edit_returns_changed_images() {
        let mut idx = index(&["a.png", "b.png"], &[("n.md", "![[a.png]]")]);
        let touched = idx.upsert_note(&p("n.md"), "![[b.png]]");
        assert_eq!(touched, set(&["a.png", "b.png"]));
        assert_eq!(idx.reference_count(&p("a.png")), 0);

        assert!(idx.upsert_note(&p("n.md"), "![[b.png]] again").is_empty());
    }

    #[test]
    fn dangling_link_binds_when_image_appears() {
        let mut idx = index(&[], &[("n.md", "![[later.png]]")]);
        assert_eq!(idx.reference_count(&p("x/later.png")), 0);

        let touched = idx.insert_image(&p("x/later.png"));
        assert!(touched.contains(&p("x/later.png")));
        assert_eq!(idx.notes_referencing(&p("x/later.png")), &set(&["n.md"]));

        idx.remove_image(&p("x/later.png"));
        assert!(idx.images_embedded_by(&p("n.md")).is_empty());
        assert!(idx.verify_transpose().is_ok());
    }

    #[test]
    fn note_rename_reresolves_relative_links() {
        let mut idx = index(&["a/x.png", "b/x.png"], &[("a/n.md", "![](./x.png)")]);
        assert_eq!(idx.images_embedded_by(&p("a/n.md")), &set(&["a/x.png"]));

        let touched = idx.rename_note(&p("a/n.md"), &p("b/n.md"));
        assert_eq!(touched, set(&["a/x.png", "b/x.png"]));
        assert_eq!(idx.images_embedded_by(&p("b/n.md")), &set(&["b/x.png"]));
        assert!(!idx.contains_note(&p("a/n.md")));
        assert!(idx.rename_note(&p("a/n.md"), &p("c/n.md")).is_empty());
    }

    #[test]
    fn image_rename_is_idempotent() {
        let mut idx = index(&["a.png"], &[("n.md", "![[a.png]]")]);
        let touched = idx.rename_image(&p("a.png"), &p("z/a.png"));
        assert_eq!(touched, set(&["a.png", "z/a.png"]));
        assert_eq!(idx.notes_referencing(&p("z/a.png")), &set(&["n.md"]));

        assert!(idx.rename_image(&p("a.png"), &p("z/a.png")).is_empty());
    }

    #[test]
    fn ambiguity_follows_resolver() {
        let idx = index(&["a/x.png", "b/x.png"], &[("b/n.md", "![[x.png]]"), ("n.md", "![[x.png]]")]);
        assert_eq!(idx.images_embedded_by(&p("b/n.md")), &set(&["b/x.png"]));
        assert_eq!(idx.images_embedded_by(&p("n.md")), &set(&["a/x.png"]));
    }

    #[test]
    fn transpose_check_catches_drift() {
        let mut idx = index(&["a.png"], &[("n.md", "![[a.png]]")]);
        idx.inverse.clear();
        assert!(matches!(
            idx.verify_transpose(),
            Err(IndexError::TransposeMismatch { image }) if image == p("a.png")
        ));
    }

    #[tokio::test]
    async fn build_skips_unreadable_notes() {
        let vault = MemoryVault::new();
        vault.insert(&p("a.png"), vec![1]);
        vault.insert(&p("ok.md"), "![[a.png]]");
        vault.insert(&p("bad.md"), "![[a.png]]");
        vault.fail_reads_of(&p("bad.md"));

        let idx = ReferenceIndex::build(&vault).await.unwrap();
        assert_eq!(idx.notes_referencing(&p("a.png")), &set(&["ok.md"]));
        assert!(!idx.contains_note(&p("bad.md")));
    }
}
