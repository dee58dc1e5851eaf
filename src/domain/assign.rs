//! Anchor assigner
//!
//! Gives every heading a unique, URL-safe anchor identifier derived from its
//! text. Collisions are resolved case-insensitively by appending `-2`, `-3`, …
//! to the base candidate.

use std::collections::HashSet;

use super::document::Document;
use super::slug::{is_slug, normalize, slug};

/// Maximum length of a generated anchor (before any collision suffix)
pub const DEFAULT_ANCHOR_MAX_LENGTH: usize = 60;

/// Options for [`assign_heading_ids_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignOptions {
    /// Prefix for every anchor, e.g. when embedding one document inside another
    pub prefix: Option<String>,

    /// Slug length bound for generated anchors
    pub max_length: usize,

    /// Keep `id` attributes already present on headings when they are unique
    /// and already in slug form
    pub preserve_existing: bool,
}

impl Default for AssignOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            max_length: DEFAULT_ANCHOR_MAX_LENGTH,
            preserve_existing: true,
        }
    }
}

impl AssignOptions {
    /// Normalized prefix, or `None` if unset or empty after normalization
    fn normalized_prefix(&self) -> Option<String> {
        self.prefix
            .as_deref()
            .map(normalize)
            .filter(|p| !p.is_empty())
    }
}

/// Case-insensitive set of anchors already used in a document
#[derive(Debug, Default)]
struct AnchorSet {
    used: HashSet<String>,
}

impl AnchorSet {
    /// Reserves an exact anchor; returns false if it is already taken
    fn reserve(&mut self, anchor: &str) -> bool {
        self.used.insert(anchor.to_lowercase())
    }

    /// Claims `base`, or the first free `base-N` for N = 2, 3, …
    fn claim(&mut self, base: &str) -> String {
        if self.reserve(base) {
            return base.to_string();
        }

        let mut n = 2u32;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Assigns anchors with default options. See [`assign_heading_ids_with`].
pub fn assign_heading_ids(document: &Document) -> Document {
    assign_heading_ids_with(document, &AssignOptions::default())
}

/// Returns a copy of `document` in which every heading carries a unique anchor.
///
/// With `preserve_existing`, unique pre-existing ids are reserved first (in
/// document order, first occurrence wins) so generated anchors never steal
/// them. An id is only kept if it is already a slug (see [`is_slug`]).
/// Duplicated, missing or non-slug ids are regenerated from the heading text.
pub fn assign_heading_ids_with(document: &Document, options: &AssignOptions) -> Document {
    let mut out = document.clone();
    let prefix = options.normalized_prefix();
    let mut anchors = AnchorSet::default();

    for heading in out.headings_mut() {
        let kept = match heading.anchor() {
            Some(existing) if options.preserve_existing && is_slug(existing) => {
                let effective = with_prefix(prefix.as_deref(), existing);
                anchors.reserve(&effective).then_some(effective)
            }
            _ => None,
        };
        heading.anchor_id = kept;
    }

    let mut generated = 0usize;
    for heading in out.headings_mut() {
        if heading.anchor_id.is_some() {
            continue;
        }
        let base = with_prefix(prefix.as_deref(), &slug(&heading.text, options.max_length));
        heading.anchor_id = Some(anchors.claim(&base));
        generated += 1;
    }

    tracing::debug!(
        headings = out.heading_count(),
        generated,
        "assigned heading anchors"
    );

    out
}

fn with_prefix(prefix: Option<&str>, anchor: &str) -> String {
    match prefix {
        Some(p) if !anchor.starts_with(&format!("{}-", p)) => format!("{}-{}", p, anchor),
        _ => anchor.to_string(),
    }
}
