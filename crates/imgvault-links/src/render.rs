//! Embed rendering for newly placed images

use imgvault_index::syntax::encode_spaces;
use imgvault_index::LinkResolver;
use imgvault_vault::VaultPath;
use serde::{Deserialize, Serialize};

/// Syntax used when inserting an embed for a new image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStyle {
    /// `![[name.png]]`, falling back to the full path when the name is ambiguous
    #[default]
    Wiki,
    /// `![](folder/name.png)` from the vault root
    Markdown,
    /// `![](../folder/name.png)` from the note's folder
    MarkdownRelative,
}

/// Embed text pointing from `note` at `image`
///
/// Wiki embeds use the bare name only when it resolves back to `image`.
#[must_use]
pub fn render_embed(style: LinkStyle, note: &VaultPath, image: &VaultPath, resolver: &LinkResolver) -> String {
    match style {
        LinkStyle::Wiki => {
            let bare = image.name();
            if resolver.resolve(note, bare).as_ref() == Some(image) {
                format!("![[{bare}]]")
            } else {
                format!("![[{image}]]")
            }
        }
        LinkStyle::Markdown => format!("![]({})", encode_spaces(image.as_str())),
        LinkStyle::MarkdownRelative => {
            format!("![]({})", encode_spaces(&image.relative_from(note.folder())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VaultPath {
        VaultPath::parse(s).unwrap()
    }

    #[test]
    fn wiki_prefers_bare_name() {
        let r = LinkResolver::from_images([p("att/cat.png")]);
        assert_eq!(render_embed(LinkStyle::Wiki, &p("n.md"), &p("att/cat.png"), &r), "![[cat.png]]");
    }

    #[test]
    fn wiki_falls_back_to_path_when_ambiguous() {
        let r = LinkResolver::from_images([p("a/cat.png"), p("b/cat.png")]);
        assert_eq!(render_embed(LinkStyle::Wiki, &p("n.md"), &p("b/cat.png"), &r), "![[b/cat.png]]");
    }

    #[test]
    fn markdown_styles() {
        let r = LinkResolver::new();
        let image = p("att/my cat.png");
        assert_eq!(render_embed(LinkStyle::Markdown, &p("d/n.md"), &image, &r), "![](att/my%20cat.png)");
        assert_eq!(
            render_embed(LinkStyle::MarkdownRelative, &p("d/n.md"), &image, &r),
            "![](../att/my%20cat.png)"
        );
    }

    #[test]
    fn style_names_are_kebab_case() {
        let style: LinkStyle = serde_json::from_str("\"markdown-relative\"").unwrap();
        assert_eq!(style, LinkStyle::MarkdownRelative);
    }
}
