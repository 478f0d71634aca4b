//! Testing utilities for imgvault workspace
//!
//! Vault fixtures and assertions shared by integration tests.

#![allow(missing_docs)]

use imgvault_core::{ImageManager, Settings};
use imgvault_vault::{MemoryVault, VaultPath};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn p(s: &str) -> VaultPath {
    VaultPath::parse(s).unwrap()
}

/// PNG-looking bytes; distinct seeds give distinct content
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&[seed; 16]);
    bytes
}

#[derive(Debug, Default)]
pub struct VaultBuilder {
    vault: MemoryVault,
    next_seed: u8,
}

impl VaultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image with unique content
    pub fn image(mut self, path: &str) -> Self {
        self.next_seed = self.next_seed.wrapping_add(1);
        self.vault.insert(&p(path), png_bytes(self.next_seed));
        self
    }

    pub fn image_bytes(self, path: &str, bytes: &[u8]) -> Self {
        self.vault.insert(&p(path), bytes);
        self
    }

    pub fn note(self, path: &str, text: &str) -> Self {
        self.vault.insert(&p(path), text);
        self
    }

    pub fn build(self) -> MemoryVault {
        self.vault
    }

    pub async fn open(self, settings: Settings) -> ImageManager<MemoryVault> {
        ImageManager::open(self.build(), settings).await.unwrap()
    }
}

pub fn assert_orphans(manager: &ImageManager<MemoryVault>, expected: &[&str]) {
    let actual: Vec<&str> = manager.orphans().iter().map(VaultPath::as_str).collect();
    let mut expected = expected.to_vec();
    expected.sort_unstable();
    assert_eq!(actual, expected, "orphan set mismatch");
}
