//! HTML document model
//!
//! A [`Document`] is the upstream generator's HTML split into plain markup
//! and heading elements, plus the table-of-contents block (if any) lifted
//! out of the body.
//!
//! ```text
//! <nav class="minitoc" data-minitoc="v1">...</nav>   <- toc block (rendered first)
//! <p>intro</p>                                       <- markup
//! <h2 id="setup">Setup</h2>                          <- heading
//! <p>...</p>                                         <- markup
//! ```
//!
//! Only heading elements are interpreted. Everything else passes through
//! untouched, so `Document::parse(html).render()` preserves the body.

use std::fmt;

use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::{Captures, Regex};
use thiserror::Error;

use super::heading::Heading;

/// Attribute marking a generated table-of-contents block
pub const TOC_MARKER_ATTR: &str = "data-minitoc";

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-6])((?:\s[^>]*)?)>(.*?)</h([1-6])\s*>").expect("valid heading regex")
});

static OPEN_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h[1-6](?:\s[^>]*)?>").expect("valid open-heading regex"));

static CLOSE_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</h[1-6]\s*>").expect("valid close-heading regex"));

static TOC_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<nav\b[^>]*\sdata-minitoc\b[^>]*>.*?</nav\s*>\n?").expect("valid toc regex")
});

static ID_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid id regex")
});

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("valid entity regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid title regex"));

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Heading opened as <h{open}> but closed as </h{close}> at byte {offset}")]
    MismatchedHeading { open: u8, close: u8, offset: usize },

    #[error("Unclosed heading tag '{tag}' at byte {offset}")]
    UnclosedHeading { tag: String, offset: usize },

    #[error("Closing heading tag '{tag}' without an opening tag at byte {offset}")]
    StrayClosingTag { tag: String, offset: usize },
}

/// A heading element as it appears in the markup
#[derive(Debug, Clone, PartialEq)]
struct HeadingElement {
    heading: Heading,
    /// Attributes other than `id`, verbatim
    attrs: String,
    inner_html: String,
}

impl HeadingElement {
    fn render(&self, out: &mut String) {
        let level = self.heading.level;
        out.push_str(&format!("<h{}", level));
        if let Some(id) = self.heading.anchor() {
            out.push_str(&format!(" id=\"{}\"", escape_html(id)));
        }
        if !self.attrs.is_empty() {
            out.push(' ');
            out.push_str(&self.attrs);
        }
        out.push('>');
        out.push_str(&self.inner_html);
        out.push_str(&format!("</h{}>", level));
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Markup(String),
    Heading(HeadingElement),
}

/// An HTML document split into markup and heading elements
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    segments: Vec<Segment>,
    toc_block: Option<String>,
}

impl Document {
    /// Parses an HTML document.
    ///
    /// Any existing table-of-contents block is lifted out of the body. Heading
    /// markup must be balanced: mismatched or unclosed heading tags are errors.
    pub fn parse(html: &str) -> Result<Self, DocumentError> {
        let mut toc_block = None;
        for m in TOC_BLOCK_RE.find_iter(html) {
            if toc_block.is_none() {
                toc_block = Some(m.as_str().trim_end_matches('\n').to_string());
            }
        }
        let body = TOC_BLOCK_RE.replace_all(html, "");

        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in HEADING_RE.captures_iter(&body) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let open: u8 = caps[1].parse().unwrap_or(0);
            let close: u8 = caps[4].parse().unwrap_or(0);

            if open != close {
                return Err(DocumentError::MismatchedHeading {
                    open,
                    close,
                    offset: whole.start(),
                });
            }

            let between = &body[cursor..whole.start()];
            check_no_stray_tags(between, cursor)?;
            if !between.is_empty() {
                segments.push(Segment::Markup(between.to_string()));
            }

            let (attrs, anchor_id) = split_id_attr(caps[2].trim());
            let inner_html = caps[3].to_string();
            let heading = Heading {
                level: open,
                text: text_content(&inner_html),
                anchor_id,
            };

            segments.push(Segment::Heading(HeadingElement {
                heading,
                attrs,
                inner_html,
            }));
            cursor = whole.end();
        }

        let tail = &body[cursor..];
        check_no_stray_tags(tail, cursor)?;
        if !tail.is_empty() {
            segments.push(Segment::Markup(tail.to_string()));
        }

        Ok(Self {
            segments,
            toc_block,
        })
    }

    /// Iterates over headings in document order
    pub fn headings(&self) -> impl Iterator<Item = &Heading> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Heading(h) => Some(&h.heading),
            Segment::Markup(_) => None,
        })
    }

    /// Iterates mutably over headings in document order
    pub(crate) fn headings_mut(&mut self) -> impl Iterator<Item = &mut Heading> {
        self.segments.iter_mut().filter_map(|s| match s {
            Segment::Heading(h) => Some(&mut h.heading),
            Segment::Markup(_) => None,
        })
    }

    /// Returns a copy of all headings
    pub fn heading_list(&self) -> Vec<Heading> {
        self.headings().cloned().collect()
    }

    /// Number of headings
    pub fn heading_count(&self) -> usize {
        self.headings().count()
    }

    /// Returns true if every heading carries a non-empty anchor
    pub fn is_anchored(&self) -> bool {
        self.headings().all(|h| h.anchor().is_some())
    }

    /// Returns the table-of-contents block markup, if present
    pub fn toc_block(&self) -> Option<&str> {
        self.toc_block.as_deref()
    }

    /// Replaces the table-of-contents block
    pub fn set_toc_block(&mut self, block: impl Into<String>) {
        self.toc_block = Some(block.into());
    }

    /// Removes the table-of-contents block, returning it
    pub fn take_toc_block(&mut self) -> Option<String> {
        self.toc_block.take()
    }

    /// Document title: the `<title>` element, else the first `<h1>`
    pub fn title(&self) -> Option<String> {
        let from_title_tag = self.segments.iter().find_map(|s| match s {
            Segment::Markup(m) => TITLE_RE
                .captures(m)
                .map(|c| text_content(&c[1]))
                .filter(|t| !t.is_empty()),
            Segment::Heading(_) => None,
        });

        from_title_tag.or_else(|| {
            self.headings()
                .find(|h| h.level == 1 && !h.text.is_empty())
                .map(|h| h.text.clone())
        })
    }

    /// Renders the body without the table-of-contents block
    pub fn body_html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(m) => out.push_str(m),
                Segment::Heading(h) => h.render(&mut out),
            }
        }
        out
    }

    /// Renders the full document, table-of-contents block first
    pub fn render(&self) -> String {
        let body = self.body_html();
        match &self.toc_block {
            Some(toc) => format!("{}\n{}", toc, body),
            None => body,
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::str::FromStr for Document {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn check_no_stray_tags(markup: &str, base: usize) -> Result<(), DocumentError> {
    if let Some(m) = OPEN_HEADING_RE.find(markup) {
        return Err(DocumentError::UnclosedHeading {
            tag: m.as_str().to_string(),
            offset: base + m.start(),
        });
    }
    if let Some(m) = CLOSE_HEADING_RE.find(markup) {
        return Err(DocumentError::StrayClosingTag {
            tag: m.as_str().to_string(),
            offset: base + m.start(),
        });
    }
    Ok(())
}

/// Splits an `id` attribute out of a heading's attribute string
fn split_id_attr(attrs: &str) -> (String, Option<String>) {
    match ID_ATTR_RE.captures(attrs) {
        Some(caps) => {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| decode_entities(m.as_str()))
                .filter(|v| !v.trim().is_empty());
            let rest = ID_ATTR_RE.replace(attrs, "").trim().to_string();
            (rest, value)
        }
        None => (attrs.to_string(), None),
    }
}

/// Plain text of an HTML fragment: tags removed, entities decoded, whitespace collapsed
pub fn text_content(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes named (HTML5) and numeric character references.
///
/// Unknown names and invalid code points are left as written.
pub(crate) fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            let reference = &caps[0];
            unescape_with(reference, resolve_html5_entity)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| reference.to_string())
        })
        .into_owned()
}

/// Escapes HTML special characters for text and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
