//! Per-syntax link transforms
//!
//! Each function rewrites one link form in a note's text and leaves every
//! other byte alone. A token is only touched when it resolves to `old`
//! under the given resolver, which must still describe the vault as it was
//! before the move.

use imgvault_index::syntax::parse_embeds;
use imgvault_index::{Embed, EmbedSyntax, LinkResolver};
use imgvault_vault::VaultPath;

/// Where a link is being moved from and to, seen from one note
#[derive(Debug, Clone, Copy)]
pub struct Move<'a> {
    /// Image path before the move
    pub old: &'a VaultPath,
    /// Image path after the move
    pub new: &'a VaultPath,
    /// Note whose text is being rewritten
    pub note: &'a VaultPath,
    /// Resolver reflecting the vault before the move
    pub resolver: &'a LinkResolver,
}

impl Move<'_> {
    fn targets_old(&self, embed: &Embed) -> bool {
        self.resolver.resolve(self.note, &embed.link).as_ref() == Some(self.old)
    }

    /// Replacement for a bare link to `old`, or `None` if the bare name
    /// still reaches `new` unchanged
    fn bare_link(&self) -> Option<String> {
        let link = self.settle(self.new.name().to_string());
        (link != self.old.name()).then_some(link)
    }

    /// `preferred` if it reaches `new` once the move is done, otherwise the
    /// rooted full path, which cannot be captured by a same-named image
    fn settle(&self, preferred: String) -> String {
        let lands = self
            .resolver
            .resolve_moved(self.note, &preferred, self.old, self.new)
            .is_some_and(|target| &target == self.new);
        if lands {
            preferred
        } else {
            tracing::debug!("'{preferred}' in {} would not reach {}, writing it rooted", self.note, self.new);
            format!("/{}", self.new)
        }
    }
}

/// Splice new targets into `content` for the embeds `replace` accepts
fn rewrite_embeds<F>(content: &str, syntax: EmbedSyntax, mut replace: F) -> String
where
    F: FnMut(&Embed) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for embed in parse_embeds(content).iter().filter(|e| e.syntax == syntax) {
        if let Some(target) = replace(embed) {
            out.push_str(&content[last..embed.target.start]);
            out.push_str(&target);
            last = embed.target.end;
        }
    }
    out.push_str(&content[last..]);
    out
}

/// Path form of `path` for a link originally written as `original`
///
/// Images at the vault root are always rooted (`/x.png`) so the link stays a
/// path. A leading `/` on a deeper original path is kept.
fn path_link(original: &str, path: &VaultPath) -> String {
    let rooted = original.strip_prefix('/').is_some_and(|rest| rest.contains('/'));
    if path.folder().is_empty() || rooted {
        format!("/{path}")
    } else {
        path.to_string()
    }
}

/// `![[folder/old.png]]` → `![[new/path.png]]`
#[must_use]
pub fn wiki_path(content: &str, mv: Move<'_>) -> String {
    rewrite_embeds(content, EmbedSyntax::Wiki, |embed| {
        (!embed.is_bare() && mv.targets_old(embed))
            .then(|| embed.render_target(&mv.settle(path_link(&embed.link, mv.new))))
    })
}

/// `![[old.png]]` → `![[new.png]]`
///
/// A bare link whose name did not change is left as written, unless another
/// image of that name would capture it after the move.
#[must_use]
pub fn wiki_bare(content: &str, mv: Move<'_>) -> String {
    rewrite_embeds(content, EmbedSyntax::Wiki, |embed| {
        if !embed.is_bare() || !mv.targets_old(embed) {
            return None;
        }
        mv.bare_link().map(|link| embed.render_target(&link))
    })
}

/// `![](folder/old.png)` → `![](new/path.png)`; bare targets follow the
/// file-name rule
#[must_use]
pub fn markdown_absolute(content: &str, mv: Move<'_>) -> String {
    rewrite_embeds(content, EmbedSyntax::Markdown, |embed| {
        if embed.is_dot_relative() || !mv.targets_old(embed) {
            return None;
        }
        if embed.is_bare() {
            return mv.bare_link().map(|link| embed.render_target(&link));
        }
        Some(embed.render_target(&mv.settle(path_link(&embed.link, mv.new))))
    })
}

/// `![](../old.png)` → relative path from the note's folder to the new file
#[must_use]
pub fn markdown_relative(content: &str, mv: Move<'_>) -> String {
    rewrite_embeds(content, EmbedSyntax::Markdown, |embed| {
        (embed.is_dot_relative() && mv.targets_old(embed))
            .then(|| embed.render_target(&mv.new.relative_from(mv.note.folder())))
    })
}

/// All four transforms in order
#[must_use]
pub fn rewrite_note(content: &str, mv: Move<'_>) -> String {
    let content = wiki_path(content, mv);
    let content = wiki_bare(&content, mv);
    let content = markdown_absolute(&content, mv);
    markdown_relative(&content, mv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    fn resolver(images: &[&str]) -> LinkResolver {
        LinkResolver::from_images(images.iter().map(|s| p(s)))
    }

    #[test]
    fn wiki_path_keeps_alias() {
        let r = resolver(&["img/a.png"]);
        let (old, new, note) = (p("img/a.png"), p("pics/b.png"), p("n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(wiki_path("![[img/a.png|200]] ![[a.png]]", mv), "![[pics/b.png|200]] ![[a.png]]");
    }

    #[test]
    fn wiki_bare_needs_name_change() {
        let r = resolver(&["img/a.png"]);
        let (old, note) = (p("img/a.png"), p("n.md"));

        let moved = p("pics/a.png");
        let mv = Move { old: &old, new: &moved, note: &note, resolver: &r };
        assert_eq!(wiki_bare("![[a.png]]", mv), "![[a.png]]");

        let renamed = p("img/b.png");
        let mv = Move { old: &old, new: &renamed, note: &note, resolver: &r };
        assert_eq!(wiki_bare("![[a.png#sub]]", mv), "![[b.png#sub]]");
    }

    #[test]
    fn same_name_elsewhere_is_left_alone() {
        let r = resolver(&["a/x.png", "b/x.png"]);
        let (old, new, note) = (p("a/x.png"), p("a/y.png"), p("b/n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(rewrite_note("![[x.png]] ![](x.png)", mv), "![[x.png]] ![](x.png)");
    }

    #[test]
    fn markdown_absolute_keeps_title_and_root_marker() {
        let r = resolver(&["img/a b.png"]);
        let (old, new, note) = (p("img/a b.png"), p("pics/c d.png"), p("n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(
            markdown_absolute(r#"![x](/img/a%20b.png "T") ![](<img/a b.png>)"#, mv),
            r#"![x](/pics/c%20d.png "T") ![](<pics/c d.png>)"#
        );
    }

    #[test]
    fn markdown_relative_recomputes_from_note_folder() {
        let r = resolver(&["a/b/img/x.png"]);
        let (old, new, note) = (p("a/b/img/x.png"), p("c/x.png"), p("a/b/note.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(markdown_relative("![](./img/x.png)", mv), "![](../../c/x.png)");
    }

    #[test]
    fn code_spans_are_not_rewritten() {
        let r = resolver(&["img/a.png"]);
        let (old, new, note) = (p("img/a.png"), p("img/b.png"), p("n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        let content = "![[img/a.png]] `![[img/a.png]]`";
        assert_eq!(rewrite_note(content, mv), "![[img/b.png]] `![[img/a.png]]`");
    }

    #[test]
    fn move_to_root_stays_a_path() {
        let r = resolver(&["x/a.png", "y/a.png"]);
        let (old, new, note) = (p("x/a.png"), p("a.png"), p("y/n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(rewrite_note("![[x/a.png]] ![](x/a.png)", mv), "![[/a.png]] ![](/a.png)");
    }

    #[test]
    fn rooted_root_link_loses_marker_when_moved_into_a_folder() {
        let r = resolver(&["a.png"]);
        let (old, new, note) = (p("a.png"), p("img/a.png"), p("n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(wiki_path("![[/a.png]]", mv), "![[img/a.png]]");
    }

    #[test]
    fn bare_rename_captured_by_neighbour_is_rooted() {
        let r = resolver(&["x/a.png", "y/b.png"]);
        let (old, new, note) = (p("x/a.png"), p("x/b.png"), p("y/n.md"));
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(rewrite_note("![[a.png]] ![](a.png)", mv), "![[/x/b.png]] ![](/x/b.png)");
    }

    #[test]
    fn bare_name_kept_unless_captured_after_folder_move() {
        let r = resolver(&["a/y.png", "y.png"]);
        let (old, new) = (p("a/y.png"), p("b/y.png"));

        let note = p("a/n.md");
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(wiki_bare("![[y.png]]", mv), "![[/b/y.png]]");

        let r = resolver(&["a/y.png"]);
        let mv = Move { old: &old, new: &new, note: &note, resolver: &r };
        assert_eq!(wiki_bare("![[y.png]]", mv), "![[y.png]]");
    }
}
