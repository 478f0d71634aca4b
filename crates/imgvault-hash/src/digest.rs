//! Truncated content digests
//!
//! Provides [`ContentDigest`], an 8-byte BLAKE3 prefix used to recognise
//! identical image bytes.
//!
//! Truncation is a compactness trade-off. With 64 bits the birthday bound
//! puts a collision among 65k images near 2^-32; that is accepted as
//! negligible for a vault, but it is a probability, not a guarantee.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Number of digest bytes kept
pub const DIGEST_LEN: usize = 8;

/// Truncated BLAKE3 digest of file bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Create digest from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly [`DIGEST_LEN`]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Digest arbitrary bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let full = blake3::hash(data);
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&full.as_bytes()[..DIGEST_LEN]);
        Self(arr)
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentDigest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for ContentDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ContentDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DigestVisitor;

        impl serde::de::Visitor<'_> for DigestVisitor {
            type Value = ContentDigest;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a 16-character hex digest")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}

/// Errors that can occur when parsing digests
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid digest length
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
