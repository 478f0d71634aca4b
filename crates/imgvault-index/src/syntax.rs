//! Embed syntax recognition
//!
//! Two embed forms are recognised in note text:
//!
//! - wiki: `![[target]]`, `![[target|alias]]`, `![[target#subpath]]`
//! - markdown: `![alt](target)`, `![alt](<target with spaces>)`,
//!   `![alt](target "title")`
//!
//! Only targets with an image extension count. Anything inside a fenced or
//! indented code block or an inline code span is ignored.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser as MdParser, Tag};
use regex::Regex;
use std::ops::Range;

static WIKI_EMBED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[\[([^\]|#]+)((?:[#|][^\]]*)?)\]\]").expect("Invalid wiki embed regex")
});

static MARKDOWN_EMBED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\((<[^>]+>|[^)\s]+)((?:\s+"[^"]*")?)\)"#)
        .expect("Invalid markdown embed regex")
});

static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("Invalid URL scheme regex"));

/// Which of the two embed syntaxes a match used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedSyntax {
    /// `![[target]]`
    Wiki,
    /// `![alt](target)`
    Markdown,
}

/// One image embed found in note text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    /// Syntax of the match
    pub syntax: EmbedSyntax,
    /// Byte range of the target as written (angle brackets included,
    /// surrounding spaces of a wiki target excluded)
    pub target: Range<usize>,
    /// Link text used for resolution: decoded, subpath and brackets removed
    pub link: String,
    /// Target was written as `<...>`
    pub angled: bool,
    /// `#fragment` written after a markdown target, kept on rewrite
    pub fragment: Option<String>,
}

impl Embed {
    /// Link is written relative to the note (`./` or `../`)
    #[inline]
    #[must_use]
    pub fn is_dot_relative(&self) -> bool {
        is_dot_relative(&self.link)
    }

    /// Link is a bare file name with no folder part
    #[inline]
    #[must_use]
    pub fn is_bare(&self) -> bool {
        !self.link.contains('/')
    }

    /// Render `link` the way this embed's target was written
    #[must_use]
    pub fn render_target(&self, link: &str) -> String {
        match self.syntax {
            EmbedSyntax::Wiki => link.to_string(),
            EmbedSyntax::Markdown => {
                let fragment = self.fragment.as_deref().unwrap_or_default();
                if self.angled {
                    format!("<{link}{fragment}>")
                } else {
                    format!("{}{fragment}", encode_spaces(link))
                }
            }
        }
    }
}

/// Whether `link` starts with `./` or `../`
#[must_use]
pub fn is_dot_relative(link: &str) -> bool {
    link.starts_with("./") || link.starts_with("../")
}

/// Markdown targets cannot hold bare spaces outside `<...>`
#[must_use]
pub fn encode_spaces(link: &str) -> String {
    link.replace(' ', "%20")
}

/// Last path segment of a link, lower-cased
///
/// Every resolution of a link ends on a file with this name, which is what
/// lets the index find the notes affected by an image appearing or going.
#[must_use]
pub fn link_file_name(link: &str) -> String {
    link.rsplit('/').next().unwrap_or(link).to_lowercase()
}

/// Whether the link names a file with an image extension
#[must_use]
pub fn has_image_extension(link: &str) -> bool {
    let name = link.rsplit('/').next().unwrap_or(link);
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            imgvault_vault::IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        }
        _ => false,
    }
}

/// Byte ranges of code blocks and inline code spans
#[must_use]
pub fn code_ranges(content: &str) -> Vec<Range<usize>> {
    MdParser::new(content)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
        .collect()
}

/// Every image embed in `content`, in text order
#[must_use]
pub fn parse_embeds(content: &str) -> Vec<Embed> {
    let code = code_ranges(content);
    let in_code = |at: usize| code.iter().any(|range| range.contains(&at));

    let mut embeds = Vec::new();

    for caps in WIKI_EMBED.captures_iter(content) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if in_code(whole.start()) {
            continue;
        }
        let raw = target.as_str();
        let link = raw.trim();
        if !has_image_extension(link) {
            continue;
        }
        let start = target.start() + (raw.len() - raw.trim_start().len());
        embeds.push(Embed {
            syntax: EmbedSyntax::Wiki,
            target: start..start + link.len(),
            link: link.to_string(),
            angled: false,
            fragment: None,
        });
    }

    for caps in MARKDOWN_EMBED.captures_iter(content) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if in_code(whole.start()) {
            continue;
        }
        if let Some(embed) = markdown_embed(target.as_str(), target.range()) {
            embeds.push(embed);
        }
    }

    embeds.sort_by_key(|embed| embed.target.start);
    embeds
}

fn markdown_embed(raw: &str, range: Range<usize>) -> Option<Embed> {
    let (inner, angled) = match raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        Some(inner) => (inner, true),
        None => (raw, false),
    };
    if URL_SCHEME.is_match(inner) {
        return None;
    }
    let (without_fragment, fragment) = match inner.find('#') {
        Some(idx) => (&inner[..idx], Some(inner[idx..].to_string())),
        None => (inner, None),
    };
    let link = without_fragment.replace("%20", " ");
    if link.is_empty() || !has_image_extension(&link) {
        return None;
    }
    Some(Embed {
        syntax: EmbedSyntax::Markdown,
        target: range,
        link,
        angled,
        fragment,
    })
}
