//! Host file notifications and their routing
//!
//! The host reports raw file changes as [`VaultEvent`]s. [`route`] is a
//! pure classifier that decides which single handler an event belongs to;
//! the manager then applies it.

use imgvault_vault::VaultPath;
use serde::{Deserialize, Serialize};

/// A file change reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VaultEvent {
    /// A file appeared
    Created {
        /// New file
        path: VaultPath,
    },
    /// A file's content changed
    Modified {
        /// Changed file
        path: VaultPath,
    },
    /// A file was removed
    Deleted {
        /// Removed file
        path: VaultPath,
    },
    /// A file moved
    Renamed {
        /// Previous path
        from: VaultPath,
        /// Current path
        to: VaultPath,
    },
}

/// The handler an event is dispatched to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// An image appeared
    ImageCreated(VaultPath),
    /// An image was removed
    ImageDeleted(VaultPath),
    /// An image moved; links must follow
    ImageRenamed {
        /// Previous path
        from: VaultPath,
        /// Current path
        to: VaultPath,
    },
    /// A note appeared or its text changed
    NoteChanged(VaultPath),
    /// A note was removed
    NoteDeleted(VaultPath),
    /// A note moved
    NoteRenamed {
        /// Previous path
        from: VaultPath,
        /// Current path
        to: VaultPath,
    },
    /// Nothing to do
    Ignored,
}

/// Classify an event
///
/// A rename that changes a file's kind becomes a delete or a create: an
/// image renamed to `.txt` is an image deletion, a `.txt` renamed to `.png`
/// an image creation. Images take precedence over notes.
#[must_use]
pub fn route(event: &VaultEvent) -> Route {
    match event {
        VaultEvent::Created { path } if path.is_image() => Route::ImageCreated(path.clone()),
        VaultEvent::Created { path } | VaultEvent::Modified { path } if path.is_note() => {
            Route::NoteChanged(path.clone())
        }
        VaultEvent::Deleted { path } if path.is_image() => Route::ImageDeleted(path.clone()),
        VaultEvent::Deleted { path } if path.is_note() => Route::NoteDeleted(path.clone()),
        VaultEvent::Renamed { from, to } => match (from.is_image(), to.is_image(), from.is_note(), to.is_note()) {
            (true, true, _, _) => Route::ImageRenamed {
                from: from.clone(),
                to: to.clone(),
            },
            (_, _, true, true) => Route::NoteRenamed {
                from: from.clone(),
                to: to.clone(),
            },
            (true, false, _, _) => Route::ImageDeleted(from.clone()),
            (false, true, _, _) => Route::ImageCreated(to.clone()),
            (_, _, true, false) => Route::NoteDeleted(from.clone()),
            (_, _, false, true) => Route::NoteChanged(to.clone()),
            _ => Route::Ignored,
        },
        _ => Route::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    #[test]
    fn plain_events() {
        assert_eq!(
            route(&VaultEvent::Created { path: p("a.png") }),
            Route::ImageCreated(p("a.png"))
        );
        assert_eq!(route(&VaultEvent::Created { path: p("n.md") }), Route::NoteChanged(p("n.md")));
        assert_eq!(route(&VaultEvent::Modified { path: p("n.md") }), Route::NoteChanged(p("n.md")));
        assert_eq!(route(&VaultEvent::Modified { path: p("a.png") }), Route::Ignored);
        assert_eq!(route(&VaultEvent::Deleted { path: p("a.PNG") }), Route::ImageDeleted(p("a.PNG")));
        assert_eq!(route(&VaultEvent::Deleted { path: p("n.md") }), Route::NoteDeleted(p("n.md")));
        assert_eq!(route(&VaultEvent::Created { path: p("data.json") }), Route::Ignored);
    }

    #[test]
    fn renames() {
        let rename = |from: &str, to: &str| route(&VaultEvent::Renamed { from: p(from), to: p(to) });
        assert_eq!(
            rename("a.png", "b/a.png"),
            Route::ImageRenamed { from: p("a.png"), to: p("b/a.png") }
        );
        assert_eq!(
            rename("a.md", "b/a.md"),
            Route::NoteRenamed { from: p("a.md"), to: p("b/a.md") }
        );
        assert_eq!(rename("a.png", "a.txt"), Route::ImageDeleted(p("a.png")));
        assert_eq!(rename("a.txt", "a.png"), Route::ImageCreated(p("a.png")));
        assert_eq!(rename("a.md", "a.txt"), Route::NoteDeleted(p("a.md")));
        assert_eq!(rename("a.txt", "a.md"), Route::NoteChanged(p("a.md")));
        assert_eq!(rename("a.txt", "b.txt"), Route::Ignored);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let event: VaultEvent = serde_json::from_str(r#"{"kind":"renamed","from":"a.png","to":"b.png"}"#).unwrap();
        assert_eq!(event, VaultEvent::Renamed { from: p("a.png"), to: p("b.png") });
    }
}
