//! Document registry entries
//!
//! A registry entry is a compact, read-optimized snapshot of one document's
//! headings, keyed by its [`DocUid`]. Other documents consult it to build
//! links into this one. The document stays the source of truth: entries are
//! rebuilt and replaced wholesale, never patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assign::assign_heading_ids;
use super::document::{Document, DocumentError};
use super::id::DocUid;
use super::slug::slug;

/// Length bound for document slugs
pub const DOC_SLUG_MAX_LENGTH: usize = 80;

/// Copy of one heading as seen by other documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingSnapshot {
    pub anchor_id: String,
    pub text: String,
    pub level: u8,
}

/// Cross-document summary of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Stable cross-reference key, never changes for the life of the document
    pub doc_uid: DocUid,

    /// Human-readable slug of the title; may change with the title
    pub doc_slug: String,

    /// Key of the document in the document store
    pub source_key: String,

    pub title: String,

    /// Headings in document order
    pub headings: Vec<HeadingSnapshot>,

    /// blake3 hash of the source markup this entry was built from
    pub content_hash: String,

    pub updated_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// Parses `html` and builds a fresh entry for it
    pub fn build(
        doc_uid: DocUid,
        source_key: impl Into<String>,
        html: &str,
    ) -> Result<Self, DocumentError> {
        let document = Document::parse(html)?;
        Ok(Self::from_document(
            doc_uid,
            source_key,
            &document,
            content_hash(html),
        ))
    }

    /// Builds an entry from an already-parsed document.
    ///
    /// The title falls back to the source key when the document has neither
    /// a `<title>` nor an `<h1>`.
    pub fn from_document(
        doc_uid: DocUid,
        source_key: impl Into<String>,
        document: &Document,
        content_hash: String,
    ) -> Self {
        let source_key = source_key.into();
        let title = document.title().unwrap_or_else(|| source_key.clone());

        Self {
            doc_uid,
            doc_slug: generate_doc_slug(&title),
            source_key,
            title,
            headings: extract_headings_registry(document),
            content_hash,
            updated_at: Utc::now(),
        }
    }

    /// Looks up a heading by anchor (exact match)
    pub fn heading(&self, anchor_id: &str) -> Option<&HeadingSnapshot> {
        self.headings.iter().find(|h| h.anchor_id == anchor_id)
    }

    pub fn has_anchor(&self, anchor_id: &str) -> bool {
        self.heading(anchor_id).is_some()
    }
}

/// Slug for a document title
pub fn generate_doc_slug(title: &str) -> String {
    slug(title, DOC_SLUG_MAX_LENGTH)
}

/// Snapshots a document's headings.
///
/// If any heading lacks an anchor, anchors are assigned on a copy first, which
/// yields the same anchors the table-of-contents pipeline would produce.
pub fn extract_headings_registry(document: &Document) -> Vec<HeadingSnapshot> {
    let anchored;
    let source = if document.is_anchored() {
        document
    } else {
        anchored = assign_heading_ids(document);
        &anchored
    };

    source
        .headings()
        .map(|h| HeadingSnapshot {
            anchor_id: h.anchor().unwrap_or_default().to_string(),
            text: h.text.clone(),
            level: h.level,
        })
        .collect()
}

/// Hex blake3 hash of document markup
pub fn content_hash(html: &str) -> String {
    blake3::hash(html.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::toc::build_minitoc;

    #[test]
    fn extracts_headings_in_order() {
        let doc = Document::parse("<h1>Guide</h1><h2>Setup</h2><h2>Setup</h2>").unwrap();
        let headings = extract_headings_registry(&doc);

        let anchors: Vec<_> = headings.iter().map(|h| h.anchor_id.as_str()).collect();
        assert_eq!(anchors, vec!["guide", "setup", "setup-2"]);
        assert_eq!(headings[1].level, 2);
        assert_eq!(headings[1].text, "Setup");
    }

    #[test]
    fn extraction_matches_minitoc_anchors() {
        let doc = Document::parse("<h1>A</h1><h2 id=\"custom\">B</h2><h2>A</h2>").unwrap();
        let from_raw = extract_headings_registry(&doc);
        let from_built = extract_headings_registry(&build_minitoc(&doc));

        assert_eq!(from_raw, from_built);
    }

    #[test]
    fn builds_entry_with_slug_and_hash() {
        let html = "<title>Café Guide</title><h1>Welcome</h1>";
        let entry = RegistryEntry::build(DocUid::generate(), "guides/cafe", html).unwrap();

        assert_eq!(entry.title, "Café Guide");
        assert_eq!(entry.doc_slug, "cafe-guide");
        assert_eq!(entry.source_key, "guides/cafe");
        assert_eq!(entry.content_hash, content_hash(html));
        assert!(entry.has_anchor("welcome"));
        assert!(!entry.has_anchor("missing"));
    }

    #[test]
    fn title_falls_back_to_source_key() {
        let entry = RegistryEntry::build(DocUid::generate(), "notes/untitled", "<p>x</p>").unwrap();
        assert_eq!(entry.title, "notes/untitled");
        assert_eq!(entry.doc_slug, "notes-untitled");
        assert!(entry.headings.is_empty());
    }

    #[test]
    fn malformed_markup_is_error() {
        assert!(RegistryEntry::build(DocUid::generate(), "bad", "<h2>Broken</h3>").is_err());
    }

    #[test]
    fn doc_slug_is_bounded() {
        let title = "A very long title ".repeat(10);
        assert!(generate_doc_slug(&title).len() <= DOC_SLUG_MAX_LENGTH);
        assert_eq!(generate_doc_slug("!!!"), "section");
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("<h1>A</h1>"), content_hash("<h1>A</h1>"));
        assert_ne!(content_hash("<h1>A</h1>"), content_hash("<h1>B</h1>"));
    }

    #[test]
    fn serde_roundtrip() {
        let entry = RegistryEntry::build(DocUid::generate(), "k", "<h1>T</h1>").unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: RegistryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);
    }
}
