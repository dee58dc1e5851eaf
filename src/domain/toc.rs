//! Table-of-contents builder
//!
//! The outline is an index-addressed arena: every [`TocNode`] lives in one
//! vector (in document order) and points at its parent and children by index.
//!
//! ## Nesting
//!
//! Each heading becomes a child of the most recent heading with a strictly
//! smaller level. Headings with no such predecessor become roots, so a
//! document starting at `h2` simply has `h2` roots.
//!
//! ## Markup
//!
//! ```html
//! <nav class="minitoc" data-minitoc="v1" aria-label="Table of contents">
//! <ul>
//! <li><a href="#setup">Setup</a>
//! <ul>
//! <li><a href="#install">Install</a></li>
//! </ul>
//! </li>
//! </ul>
//! </nav>
//! ```
//!
//! The `data-minitoc` marker lets [`build_minitoc`] find and replace its own
//! output, which makes rebuilding idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::assign::{assign_heading_ids_with, AssignOptions};
use super::document::{decode_entities, escape_html, text_content, Document, TOC_MARKER_ATTR};
use super::heading::Heading;

/// Marker value written into generated blocks
pub const TOC_MARKER_VERSION: &str = "v1";

/// CSS class on generated blocks
pub const TOC_CLASS: &str = "minitoc";

static TOC_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"(?is)<a\s[^>]*?href\s*=\s*"#([^"]*)"[^>]*>(.*?)</a\s*>"##)
        .expect("valid toc link regex")
});

/// One entry of the outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocNode {
    /// Display text, copied from the heading
    pub title: String,

    /// Target anchor; empty when the heading had none
    pub anchor_id: String,

    /// Level of the source heading
    pub level: u8,

    /// Index of the parent node, `None` for roots
    pub parent: Option<usize>,

    /// Indices of child nodes, in document order
    pub children: Vec<usize>,
}

/// Table-of-contents outline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toc {
    nodes: Vec<TocNode>,
    roots: Vec<usize>,
}

impl Toc {
    /// All nodes in document order
    pub fn nodes(&self) -> &[TocNode] {
        &self.nodes
    }

    /// Indices of top-level nodes
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, index: usize) -> Option<&TocNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nesting depth of a node (roots are depth 0)
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// Renders the outline as a navigable block
    pub fn render(&self) -> String {
        let mut out = format!(
            "<nav class=\"{}\" {}=\"{}\" aria-label=\"Table of contents\">",
            TOC_CLASS, TOC_MARKER_ATTR, TOC_MARKER_VERSION
        );
        if !self.roots.is_empty() {
            out.push('\n');
            self.render_list(&self.roots, &mut out);
        }
        out.push_str("</nav>");
        out
    }

    fn render_list(&self, indices: &[usize], out: &mut String) {
        out.push_str("<ul>\n");
        for &index in indices {
            let node = &self.nodes[index];
            out.push_str(&format!(
                "<li><a href=\"#{}\">{}</a>",
                escape_html(&node.anchor_id),
                escape_html(&node.title)
            ));
            if !node.children.is_empty() {
                out.push('\n');
                self.render_list(&node.children, out);
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
    }
}

/// Builds the outline from headings in document order.
///
/// Headings without an anchor still get a node (with an empty anchor) so
/// the resolver can report them.
pub fn build_toc(headings: &[Heading]) -> Toc {
    let mut toc = Toc::default();
    let mut stack: Vec<usize> = Vec::new();

    for heading in headings {
        while let Some(&top) = stack.last() {
            if toc.nodes[top].level >= heading.level {
                stack.pop();
            } else {
                break;
            }
        }

        let parent = stack.last().copied();
        let index = toc.nodes.len();
        toc.nodes.push(TocNode {
            title: heading.text.clone(),
            anchor_id: heading.anchor_id.clone().unwrap_or_default(),
            level: heading.level,
            parent,
            children: Vec::new(),
        });

        match parent {
            Some(p) => toc.nodes[p].children.push(index),
            None => toc.roots.push(index),
        }
        stack.push(index);
    }

    toc
}

/// Options for [`build_minitoc_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocOptions {
    /// Deepest heading level listed in the outline
    pub max_level: u8,

    /// Anchor assignment options
    pub assign: AssignOptions,
}

impl Default for TocOptions {
    fn default() -> Self {
        Self {
            max_level: 6,
            assign: AssignOptions::default(),
        }
    }
}

/// Full pipeline with default options. See [`build_minitoc_with`].
pub fn build_minitoc(document: &Document) -> Document {
    build_minitoc_with(document, &TocOptions::default())
}

/// Assigns anchors, builds the outline, and installs it as the document's
/// table-of-contents block, replacing any previously generated block.
///
/// Anchors and outline come from the same copy of the document, so every
/// entry targets an anchor present on a heading.
pub fn build_minitoc_with(document: &Document, options: &TocOptions) -> Document {
    let mut out = assign_heading_ids_with(document, &options.assign);
    if out.take_toc_block().is_some() {
        tracing::debug!("replacing existing table of contents");
    }

    let headings: Vec<Heading> = out
        .headings()
        .filter(|h| h.level <= options.max_level)
        .cloned()
        .collect();
    let toc = build_toc(&headings);

    tracing::debug!(entries = toc.len(), "built table of contents");
    out.set_toc_block(toc.render());
    out
}

/// A link read back out of a rendered table-of-contents block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Zero-based position in the block
    pub position: usize,

    /// Link label
    pub title: String,

    /// Fragment target without the leading `#`
    pub anchor_id: String,
}

/// Reads the fragment links of a table-of-contents block, in order
pub fn parse_toc_entries(block: &str) -> Vec<TocEntry> {
    TOC_LINK_RE
        .captures_iter(block)
        .enumerate()
        .map(|(position, caps)| TocEntry {
            position,
            title: text_content(&caps[2]),
            anchor_id: decode_entities(&caps[1]),
        })
        .collect()
}
