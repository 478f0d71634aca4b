//! Link resolution
//!
//! [`LinkResolver`] is the one place that decides which image a link in a
//! note points at. The reference index and the link rewriter both go
//! through it, so they can never disagree about an ambiguous bare name.

use crate::syntax::is_dot_relative;
use imgvault_vault::{resolve_relative, VaultPath};
use std::collections::{BTreeMap, BTreeSet};

/// Catalog of known images and the rules that map links onto them
///
/// Resolution order:
///
/// 1. `./x.png`, `../x.png`: joined onto the note's folder
/// 2. `img/x.png`, `/img/x.png`: vault path first, then relative to the note
/// 3. `x.png`: looked up by file name (case-insensitive); among several
///    candidates the one in the note's own folder wins, then the shallowest,
///    then the lexicographically first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkResolver {
    images: BTreeSet<VaultPath>,
    by_name: BTreeMap<String, BTreeSet<VaultPath>>,
}

impl LinkResolver {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from image paths (non-images are skipped)
    pub fn from_images<I>(images: I) -> Self
    where
        I: IntoIterator<Item = VaultPath>,
    {
        let mut resolver = Self::new();
        for image in images {
            resolver.insert(image);
        }
        resolver
    }

    /// Add an image; returns false if it was already known or is not an image
    pub fn insert(&mut self, image: VaultPath) -> bool {
        if !image.is_image() || self.images.contains(&image) {
            return false;
        }
        self.by_name
            .entry(image.name().to_lowercase())
            .or_default()
            .insert(image.clone());
        self.images.insert(image)
    }

    /// Forget an image; returns false if it was not known
    pub fn remove(&mut self, image: &VaultPath) -> bool {
        if !self.images.remove(image) {
            return false;
        }
        let key = image.name().to_lowercase();
        if let Some(paths) = self.by_name.get_mut(&key) {
            paths.remove(image);
            if paths.is_empty() {
                self.by_name.remove(&key);
            }
        }
        true
    }

    /// Whether the image is in the catalog
    #[inline]
    #[must_use]
    pub fn contains(&self, image: &VaultPath) -> bool {
        self.images.contains(image)
    }

    /// Known images in path order
    pub fn images(&self) -> impl Iterator<Item = &VaultPath> {
        self.images.iter()
    }

    /// Number of known images
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Check if the catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images whose file name matches `name`, ignoring case
    pub fn candidates(&self, name: &str) -> impl Iterator<Item = &VaultPath> {
        self.by_name
            .get(&name.to_lowercase())
            .into_iter()
            .flat_map(BTreeSet::iter)
    }

    /// Image that `link`, written in `note`, points at
    ///
    /// Returns `None` for dangling links.
    #[must_use]
    pub fn resolve(&self, note: &VaultPath, link: &str) -> Option<VaultPath> {
        self.resolve_in(note, link, None)
    }

    /// Image that `link` would point at once `old` has been renamed to `new`
    ///
    /// The catalog itself is not changed.
    #[must_use]
    pub fn resolve_moved(&self, note: &VaultPath, link: &str, old: &VaultPath, new: &VaultPath) -> Option<VaultPath> {
        self.resolve_in(note, link, Some((old, new)))
    }

    fn resolve_in(&self, note: &VaultPath, link: &str, moved: Option<(&VaultPath, &VaultPath)>) -> Option<VaultPath> {
        let folder = note.folder();
        let known = |path: &VaultPath| match moved {
            Some((old, new)) => path == new || (path != old && self.contains(path)),
            None => self.contains(path),
        };

        if is_dot_relative(link) {
            return resolve_relative(folder, link).filter(|path| known(path));
        }

        if link.contains('/') {
            let absolute = link.strip_prefix('/').unwrap_or(link);
            if let Ok(path) = VaultPath::parse(absolute) {
                if known(&path) {
                    return Some(path);
                }
            }
            return resolve_relative(folder, absolute).filter(|path| known(path));
        }

        let mut candidates: Vec<&VaultPath> = self
            .candidates(link)
            .filter(|path| moved.map_or(true, |(old, _)| *path != old))
            .collect();
        if let Some((_, new)) = moved {
            if new.name().to_lowercase() == link.to_lowercase() && !candidates.contains(&new) {
                candidates.push(new);
                candidates.sort();
            }
        }
        Self::pick(folder, link, note, &candidates)
    }

    fn pick(folder: &str, name: &str, note: &VaultPath, candidates: &[&VaultPath]) -> Option<VaultPath> {
        match candidates {
            [] => None,
            [only] => Some((*only).clone()),
            many => {
                let chosen = many
                    .iter()
                    .find(|path| path.folder() == folder)
                    .or_else(|| {
                        many.iter()
                            .min_by(|a, b| (a.depth(), a.as_str()).cmp(&(b.depth(), b.as_str())))
                    })
                    .map(|path| (*path).clone());
                if let Some(chosen) = &chosen {
                    tracing::warn!(
                        "ambiguous link '{name}' in {note}: {} candidates, chose {chosen}",
                        many.len()
                    );
                }
                chosen
            }
        }
    }
}
