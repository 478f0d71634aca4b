//! Vault-relative paths
//!
//! Provides [`VaultPath`], the identity of every note and image in a vault,
//! plus the relative-link arithmetic used when links are rewritten.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Extensions recognised as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp", "avif"];

/// Extension of note files
pub const NOTE_EXTENSION: &str = "md";

/// A validated, vault-relative file or folder path
///
/// Segments are separated by `/`. A leading `/` is accepted on input and
/// dropped; empty, `.` and `..` segments are rejected.
///
/// # Examples
/// - `attachments/cat.png`
/// - `daily/2024-05-01.md`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultPath(String);

impl VaultPath {
    /// Parse and validate a path
    ///
    /// # Errors
    /// Returns [`PathError`] if the path is empty or has an invalid segment
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        if trimmed.contains('\\') {
            return Err(PathError::Backslash(s.to_string()));
        }
        for seg in trimmed.split('/') {
            match seg {
                "" => return Err(PathError::EmptySegment(s.to_string())),
                "." | ".." => return Err(PathError::RelativeSegment(s.to_string())),
                _ => {}
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a path from already-split segments
    ///
    /// # Errors
    /// Returns [`PathError`] if any segment is invalid
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::parse(&joined)
    }

    /// Path within `folder` (empty string for the vault root)
    ///
    /// # Errors
    /// Returns [`PathError::InvalidName`] if `name` contains a separator
    pub fn in_folder(folder: &str, name: &str) -> Result<Self, PathError> {
        if name.is_empty() || name.contains('/') {
            return Err(PathError::InvalidName(name.to_string()));
        }
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            Self::parse(name)
        } else {
            Self::parse(&format!("{folder}/{name}"))
        }
    }

    /// Full path as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment (file name with extension)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its extension
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    /// Extension as written (without the dot)
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx + 1..]),
            _ => None,
        }
    }

    /// Containing folder, `""` for files at the vault root
    #[must_use]
    pub fn folder(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Parent folder as a path (`None` at the root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let folder = self.folder();
        (!folder.is_empty()).then(|| Self(folder.to_string()))
    }

    /// Whether the extension is a known image type
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }

    /// Whether this is a markdown note
    #[must_use]
    pub fn is_note(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(NOTE_EXTENSION))
    }

    /// Append a child segment
    ///
    /// # Errors
    /// Returns [`PathError`] if `child` is not a valid relative path
    pub fn join(&self, child: &str) -> Result<Self, PathError> {
        Self::parse(&format!("{}/{}", self.0, child))
    }

    /// Same folder, different file name
    ///
    /// # Errors
    /// Returns [`PathError::InvalidName`] if `name` contains a separator
    pub fn with_name(&self, name: &str) -> Result<Self, PathError> {
        Self::in_folder(self.folder(), name)
    }

    /// Whether this path lies somewhere below `folder`
    #[must_use]
    pub fn is_within(&self, folder: &str) -> bool {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Relative link from `folder` to this path
    ///
    /// Shared leading segments collapse to `./`; each diverging folder
    /// segment of `folder` becomes one `../`.
    ///
    /// # Examples
    /// - from `a/b` to `c/x.png` → `../../c/x.png`
    /// - from `a/b` to `a/b/img/x.png` → `./img/x.png`
    #[must_use]
    pub fn relative_from(&self, folder: &str) -> String {
        let from: Vec<&str> = folder.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.segments().collect();
        let to_folder = &to[..to.len() - 1];

        let common = from
            .iter()
            .zip(to_folder)
            .take_while(|(a, b)| a == b)
            .count();
        let up = from.len() - common;
        let rest = to[common..].join("/");

        if up == 0 {
            format!("./{rest}")
        } else {
            format!("{}{rest}", "../".repeat(up))
        }
    }
}

/// Resolve a `./` or `../` style link against `folder`
///
/// Returns `None` when the link escapes above the vault root or names
/// nothing.
#[must_use]
pub fn resolve_relative(folder: &str, link: &str) -> Option<VaultPath> {
    let mut segments: Vec<&str> = folder.split('/').filter(|s| !s.is_empty()).collect();
    for part in link.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    VaultPath::from_segments(segments).ok()
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VaultPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VaultPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VaultPath> for String {
    fn from(path: VaultPath) -> Self {
        path.0
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors related to vault paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Nothing left after trimming
    #[error("vault path is empty")]
    Empty,

    /// `a//b`
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// `.` or `..` inside an absolute vault path
    #[error("path '{0}' contains a relative segment")]
    RelativeSegment(String),

    /// Windows separators are not vault paths
    #[error("path '{0}' contains a backslash")]
    Backslash(String),

    /// File name with a separator or empty
    #[error("invalid file name: '{0}'")]
    InvalidName(String),
}
