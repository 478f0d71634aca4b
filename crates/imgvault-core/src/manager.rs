//! The image manager
//!
//! [`ImageManager`] owns the reference index, the orphan tracker and the
//! hash service for one vault. All state changes go through `&mut self`,
//! so event handlers and user commands never interleave: every call sees
//! the state left by the previous one.

use crate::config::{OrphanHandling, Settings};
use crate::error::ManagerError;
use crate::events::{route, Route, VaultEvent};
use crate::info::{timestamp, ImageInfo};
use imgvault_hash::{HashService, RebuildOutcome};
use imgvault_index::ReferenceIndex;
use imgvault_links::{render_embed, LinkRewriter};
use imgvault_orphans::{OrphanTracker, ScanOutcome};
use imgvault_vault::{VaultPath, VaultStore};
use std::collections::BTreeSet;

/// Where pasted bytes ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastedImage {
    /// Image the embed points at
    pub path: VaultPath,
    /// Embed text to insert into the note
    pub embed: String,
    /// An existing image with identical bytes was reused
    pub reused: bool,
}

/// Image bookkeeping for one vault
pub struct ImageManager<V> {
    vault: V,
    settings: Settings,
    index: ReferenceIndex,
    tracker: OrphanTracker,
    hashes: HashService,
    rewriter: LinkRewriter,
    cache_location: VaultPath,
}

impl<V: VaultStore> ImageManager<V> {
    /// Load the hash cache, index the vault and run the first orphan scan
    ///
    /// # Errors
    /// Returns [`ManagerError`] if the cache path is invalid or the vault
    /// cannot be listed
    pub async fn open(vault: V, settings: Settings) -> Result<Self, ManagerError> {
        let cache_location = VaultPath::parse(&settings.hash_cache_path)?;
        let hashes = HashService::load(&vault, &cache_location).await;
        let index = ReferenceIndex::build(&vault).await?;
        tracing::info!(
            "indexed {} images and {} notes",
            index.images().count(),
            index.notes().count()
        );

        let mut manager = Self {
            vault,
            settings,
            index,
            tracker: OrphanTracker::new(),
            hashes,
            rewriter: LinkRewriter::new(),
            cache_location,
        };
        manager.scan_orphans().await?;
        Ok(manager)
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reference index
    #[inline]
    #[must_use]
    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Apply one host notification
    ///
    /// Failures are logged; a bad event never poisons later ones.
    pub async fn handle(&mut self, event: &VaultEvent) {
        let route = route(event);
        tracing::debug!("{event:?} routed to {route:?}");

        match route {
            Route::ImageCreated(path) => {
                let touched = self.index.insert_image(&path);
                self.tracker.refresh(&touched, &self.index);
            }
            Route::ImageDeleted(path) => {
                let touched = self.index.remove_image(&path);
                self.hashes.forget(&path);
                self.tracker.refresh(&touched, &self.index);
            }
            Route::ImageRenamed { from, to } => {
                self.follow_image_move(&from, &to).await;
            }
            Route::NoteChanged(note) => self.reindex_note(&note).await,
            Route::NoteDeleted(note) => {
                let touched = self.index.remove_note(&note);
                self.tracker.refresh(&touched, &self.index);
            }
            Route::NoteRenamed { from, to } => {
                if self.index.contains_note(&from) {
                    let touched = self.index.rename_note(&from, &to);
                    self.tracker.refresh(&touched, &self.index);
                } else {
                    self.reindex_note(&to).await;
                }
            }
            Route::Ignored => {}
        }
    }

    async fn reindex_note(&mut self, note: &VaultPath) {
        let touched = match self.vault.read_text(note).await {
            Ok(content) => self.index.upsert_note(note, &content),
            Err(e) if e.is_not_found() => self.index.remove_note(note),
            Err(e) => {
                tracing::warn!("cannot read {note} to reindex: {e}");
                return;
            }
        };
        self.tracker.refresh(&touched, &self.index);
    }

    /// Rewrite links for a file that is already at `to`, then advance state
    async fn follow_image_move(&mut self, from: &VaultPath, to: &VaultPath) -> usize {
        let (touched, updated) = if self.index.contains_image(from) {
            let report = self.rewriter.rewrite(&self.vault, &self.index, from, to).await;
            let touched = LinkRewriter::commit(&mut self.index, from, to, &report);
            (touched, report.count())
        } else {
            (self.index.rename_image(from, to), 0)
        };
        self.hashes.rename(from, to);
        self.tracker.refresh(&touched, &self.index);
        updated
    }

    /// Everything known about one image
    ///
    /// # Errors
    /// Returns [`ManagerError::NotAnImage`] for non-image paths and
    /// [`ManagerError::Vault`] if the file cannot be stat'ed
    pub async fn image_info(&self, path: &VaultPath) -> Result<ImageInfo, ManagerError> {
        if !path.is_image() {
            return Err(ManagerError::NotAnImage(path.clone()));
        }
        let stat = self.vault.stat(path).await?;
        let referenced_by = self.index.notes_referencing(path).clone();

        Ok(ImageInfo {
            path: path.clone(),
            name: path.name().to_string(),
            extension: path.extension().unwrap_or_default().to_ascii_lowercase(),
            size: stat.size,
            created: timestamp(stat.created),
            modified: timestamp(stat.modified),
            hash: self.hashes.cached_digest(path, stat.modified),
            is_orphan: referenced_by.is_empty(),
            referenced_by,
        })
    }

    /// Every indexed image
    pub fn images(&self) -> impl Iterator<Item = &VaultPath> {
        self.index.images()
    }

    /// Notes embedding `image`
    #[must_use]
    pub fn notes_referencing(&self, image: &VaultPath) -> &BTreeSet<VaultPath> {
        self.index.notes_referencing(image)
    }

    /// Images embedded by `note`
    #[must_use]
    pub fn images_embedded_by(&self, note: &VaultPath) -> &BTreeSet<VaultPath> {
        self.index.images_embedded_by(note)
    }

    /// Orphan set as of the last scan or mutation
    #[inline]
    #[must_use]
    pub fn orphans(&self) -> &BTreeSet<VaultPath> {
        self.tracker.orphans()
    }

    /// Whether `path` is an orphan according to the index
    pub fn is_orphan(&mut self, path: &VaultPath) -> bool {
        self.tracker.is_orphan(path, &self.index)
    }

    /// Recompute the orphan set
    ///
    /// With [`OrphanHandling::MoveToFolder`], orphans outside the orphan
    /// folder are relocated into it afterwards. The returned set lists the
    /// orphans as found, before relocation.
    ///
    /// # Errors
    /// Returns [`ManagerError`] if the vault cannot be listed or the orphan
    /// folder setting is not a valid path
    pub async fn scan_orphans(&mut self) -> Result<ScanOutcome, ManagerError> {
        let outcome = self.tracker.scan(&self.vault, &mut self.index).await?;

        if let ScanOutcome::Completed(found) = &outcome {
            if self.settings.orphans.handling == OrphanHandling::MoveToFolder {
                let folder = self.orphan_folder()?;
                let stray: Vec<VaultPath> = found
                    .iter()
                    .filter(|path| !path.is_within(folder.as_str()))
                    .cloned()
                    .collect();
                if !stray.is_empty() {
                    self.relocate(&folder, &stray).await;
                }
            }
        }
        Ok(outcome)
    }

    /// Delete the given images; returns how many were removed
    pub async fn delete_orphans(&mut self, paths: &[VaultPath]) -> usize {
        let outcome = self.tracker.delete_orphans(&self.vault, paths).await;
        let mut touched = BTreeSet::new();
        for path in &outcome.deleted {
            touched.extend(self.index.remove_image(path));
            self.hashes.forget(path);
        }
        self.tracker.refresh(&touched, &self.index);
        outcome.count()
    }

    /// Move the given images into the configured orphan folder
    ///
    /// # Errors
    /// Returns [`ManagerError::Path`] if the orphan folder setting is not a
    /// valid path
    pub async fn move_orphans(&mut self, paths: &[VaultPath]) -> Result<Vec<(VaultPath, VaultPath)>, ManagerError> {
        let folder = self.orphan_folder()?;
        Ok(self.relocate(&folder, paths).await)
    }

    fn orphan_folder(&self) -> Result<VaultPath, ManagerError> {
        Ok(VaultPath::parse(&self.settings.orphans.folder)?)
    }

    async fn relocate(&mut self, folder: &VaultPath, paths: &[VaultPath]) -> Vec<(VaultPath, VaultPath)> {
        let moved = self.tracker.move_to_orphan_folder(&self.vault, folder, paths).await;
        let mut touched = BTreeSet::new();
        for (from, to) in &moved {
            touched.extend(self.index.rename_image(from, to));
            self.hashes.rename(from, to);
        }
        self.tracker.refresh(&touched, &self.index);
        moved
    }

    /// Move an image and rewrite every embed of it
    ///
    /// Returns the number of notes rewritten.
    ///
    /// # Errors
    /// Returns [`ManagerError::NotAnImage`] if either path is not an image
    /// and [`ManagerError::Vault`] if the file cannot be moved. Notes that
    /// fail to rewrite are logged, not reported.
    pub async fn rename_image(&mut self, old: &VaultPath, new: &VaultPath) -> Result<usize, ManagerError> {
        for path in [old, new] {
            if !path.is_image() {
                return Err(ManagerError::NotAnImage(path.clone()));
            }
        }
        self.vault.rename(old, new).await?;
        Ok(self.follow_image_move(old, new).await)
    }

    /// Move several images in order, rewriting links after each
    ///
    /// Pairs that cannot be moved are logged and skipped. Returns the total
    /// number of note writes.
    pub async fn rename_images(&mut self, pairs: &[(VaultPath, VaultPath)]) -> usize {
        let mut moved = Vec::with_capacity(pairs.len());
        for (old, new) in pairs {
            if !old.is_image() || !new.is_image() {
                tracing::warn!("skipping {old} -> {new}: not an image rename");
                continue;
            }
            match self.vault.rename(old, new).await {
                Ok(()) => moved.push((old.clone(), new.clone())),
                Err(e) => tracing::warn!("cannot move {old} to {new}: {e}"),
            }
        }

        let batch = self.rewriter.rewrite_batch(&self.vault, &mut self.index, &moved).await;
        for (old, new) in &moved {
            self.hashes.rename(old, new);
        }
        self.tracker.refresh(&batch.touched, &self.index);
        batch.updated
    }

    /// An existing image whose bytes equal `bytes`
    ///
    /// # Errors
    /// Returns [`ManagerError::Vault`] if images cannot be listed
    pub async fn find_duplicate(&mut self, bytes: &[u8]) -> Result<Option<VaultPath>, ManagerError> {
        Ok(self.hashes.find_duplicate(&self.vault, bytes).await?)
    }

    /// Rehash every image and persist the cache
    ///
    /// # Errors
    /// Returns [`ManagerError`] if images cannot be listed or the cache
    /// cannot be written
    pub async fn rebuild_hashes(&mut self) -> Result<RebuildOutcome, ManagerError> {
        let outcome = self.hashes.rebuild(&self.vault).await?;
        if let RebuildOutcome::Completed { .. } = outcome {
            self.hashes.save(&self.vault, &self.cache_location).await?;
        }
        Ok(outcome)
    }

    /// Place pasted image bytes and produce the embed for `note`
    ///
    /// With duplicate detection on, bytes matching an existing image reuse
    /// that image. Otherwise the bytes are written at `desired`, or at the
    /// first free `-N` variant of it.
    ///
    /// # Errors
    /// Returns [`ManagerError`] if the paths have the wrong kind or the
    /// vault cannot be listed or written
    pub async fn ingest_paste(
        &mut self,
        note: &VaultPath,
        bytes: &[u8],
        desired: &VaultPath,
    ) -> Result<PastedImage, ManagerError> {
        if !note.is_note() {
            return Err(ManagerError::NotANote(note.clone()));
        }
        if !desired.is_image() {
            return Err(ManagerError::NotAnImage(desired.clone()));
        }

        if self.settings.dedup.enabled {
            if let Some(existing) = self.hashes.find_duplicate(&self.vault, bytes).await? {
                tracing::info!("pasted image duplicates {existing}, reusing it");
                let embed = render_embed(self.settings.link_style, note, &existing, self.index.resolver());
                return Ok(PastedImage {
                    path: existing,
                    embed,
                    reused: true,
                });
            }
        }

        let path = self.vault.free_path(desired).await?;
        self.vault.write_binary(&path, bytes).await?;
        match self.vault.stat(&path).await {
            Ok(stat) => self.hashes.record(path.clone(), HashService::hash_of(bytes), stat.modified),
            Err(e) => tracing::warn!("cannot stat new image {path}: {e}"),
        }
        let touched = self.index.insert_image(&path);
        self.tracker.refresh(&touched, &self.index);

        let embed = render_embed(self.settings.link_style, note, &path, self.index.resolver());
        tracing::info!("pasted image stored at {path}");
        Ok(PastedImage {
            path,
            embed,
            reused: false,
        })
    }

    /// Persist the hash cache without closing
    ///
    /// # Errors
    /// Returns [`ManagerError::Cache`] if the cache cannot be written
    pub async fn flush(&self) -> Result<(), ManagerError> {
        self.hashes.save(&self.vault, &self.cache_location).await?;
        Ok(())
    }

    /// Persist the hash cache and release the vault
    ///
    /// # Errors
    /// Returns [`ManagerError::Cache`] if the cache cannot be written
    pub async fn shutdown(self) -> Result<V, ManagerError> {
        self.flush().await?;
        tracing::info!("image manager shut down");
        Ok(self.vault)
    }
}
