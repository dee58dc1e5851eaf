//! Anchor resolver
//!
//! Checks that every table-of-contents link (and, separately, every in-page
//! fragment link in the body) targets an anchor that exists on a heading of
//! the same document. Validation never mutates the document.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::document::Document;
use super::toc::{parse_toc_entries, TocEntry};

/// Why a link did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UnresolvedReason {
    /// No heading carries this anchor
    MissingAnchor,

    /// The link has an empty fragment (`href="#"`)
    EmptyFragment,

    /// Several headings carry this anchor (compared case-insensitively)
    AmbiguousAnchor { count: usize },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::MissingAnchor => write!(f, "no heading has this anchor"),
            UnresolvedReason::EmptyFragment => write!(f, "empty link fragment"),
            UnresolvedReason::AmbiguousAnchor { count } => {
                write!(f, "anchor is shared by {} headings", count)
            }
        }
    }
}

/// A link whose target could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub entry: TocEntry,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry {} '{}' -> #{}: {}",
            self.entry.position, self.entry.title, self.entry.anchor_id, self.reason
        )
    }
}

/// What to do when the resolver reports findings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Log each finding and keep the document (degraded navigation)
    #[default]
    Warn,

    /// Fail with [`ResolveError::Unresolved`]
    Reject,
}

impl std::str::FromStr for GatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" | "warning" => Ok(GatePolicy::Warn),
            "reject" | "fail" | "error" => Ok(GatePolicy::Reject),
            _ => Err(format!("Unknown gate policy: {}", s)),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("{} table-of-contents link(s) do not resolve to a heading", .0.len())]
    Unresolved(Vec<UnresolvedEntry>),
}

/// Checks every table-of-contents entry against the document's heading anchors.
///
/// A document without a table-of-contents block has nothing to check.
pub fn resolve(document: &Document) -> Vec<UnresolvedEntry> {
    match document.toc_block() {
        Some(block) => check_entries(document, parse_toc_entries(block)),
        None => Vec::new(),
    }
}

/// Checks every `href="#..."` link in the body (outside the table of contents)
pub fn resolve_fragment_links(document: &Document) -> Vec<UnresolvedEntry> {
    check_entries(document, parse_toc_entries(&document.body_html()))
}

fn check_entries(document: &Document, entries: Vec<TocEntry>) -> Vec<UnresolvedEntry> {
    let mut exact: HashMap<&str, usize> = HashMap::new();
    let mut folded: HashMap<String, usize> = HashMap::new();
    for anchor in document.headings().filter_map(|h| h.anchor()) {
        *exact.entry(anchor).or_default() += 1;
        *folded.entry(anchor.to_lowercase()).or_default() += 1;
    }

    entries
        .into_iter()
        .filter_map(|entry| {
            let reason = if entry.anchor_id.is_empty() {
                Some(UnresolvedReason::EmptyFragment)
            } else if !exact.contains_key(entry.anchor_id.as_str()) {
                Some(UnresolvedReason::MissingAnchor)
            } else {
                match folded.get(&entry.anchor_id.to_lowercase()) {
                    Some(&count) if count > 1 => Some(UnresolvedReason::AmbiguousAnchor { count }),
                    _ => None,
                }
            };
            reason.map(|reason| UnresolvedEntry { entry, reason })
        })
        .collect()
}

/// Applies the caller's policy to resolver findings
pub fn gate(findings: &[UnresolvedEntry], policy: GatePolicy) -> Result<(), ResolveError> {
    if findings.is_empty() {
        return Ok(());
    }

    match policy {
        GatePolicy::Warn => {
            for finding in findings {
                tracing::warn!(%finding, "unresolved table-of-contents link");
            }
            Ok(())
        }
        GatePolicy::Reject => Err(ResolveError::Unresolved(findings.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::toc::build_minitoc;

    fn doc(html: &str) -> Document {
        Document::parse(html).unwrap()
    }

    #[test]
    fn fresh_minitoc_resolves_cleanly() {
        let built = build_minitoc(&doc("<h1>A</h1><h2>B</h2><h2>B</h2><h3></h3>"));
        assert!(resolve(&built).is_empty());
    }

    #[test]
    fn empty_document_resolves_cleanly() {
        let built = build_minitoc(&doc("<p>nothing</p>"));
        assert!(built.toc_block().is_some());
        assert!(resolve(&built).is_empty());
    }

    #[test]
    fn document_without_toc_has_nothing_to_check() {
        assert!(resolve(&doc("<h2>A</h2>")).is_empty());
    }

    #[test]
    fn detects_slug_toc_against_placeholder_ids() {
        // Outline built from slugs while headings kept sequential placeholders
        let html = "<nav class=\"minitoc\" data-minitoc=\"v1\"><ul>\
            <li><a href=\"#overview\">Overview</a></li>\
            <li><a href=\"#details\">Details</a></li></ul></nav>\n\
            <h2 id=\"heading-1\">Overview</h2><h2 id=\"heading-2\">Details</h2>";
        let findings = resolve(&doc(html));

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].entry.anchor_id, "overview");
        assert_eq!(findings[0].reason, UnresolvedReason::MissingAnchor);
        assert_eq!(findings[1].entry.position, 1);
    }

    #[test]
    fn reports_empty_fragment() {
        let html = "<nav class=\"minitoc\" data-minitoc=\"v1\"><a href=\"#\">Top</a></nav><h2 id=\"a\">A</h2>";
        let findings = resolve(&doc(html));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].reason, UnresolvedReason::EmptyFragment);
    }

    #[test]
    fn reports_ambiguous_anchor() {
        let html = "<nav class=\"minitoc\" data-minitoc=\"v1\"><a href=\"#a\">A</a></nav><h2 id=\"a\">A</h2><h2 id=\"A\">A again</h2>";
        let findings = resolve(&doc(html));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].reason, UnresolvedReason::AmbiguousAnchor { count: 2 });
    }

    #[test]
    fn fragment_links_in_body() {
        let html = "<h2 id=\"a\">A</h2><p><a href=\"#a\">ok</a> <a href=\"#b\">broken</a> <a href=\"/x\">external</a></p>";
        let findings = resolve_fragment_links(&doc(html));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entry.anchor_id, "b");
    }

    #[test]
    fn does_not_mutate_document() {
        let original = build_minitoc(&doc("<h2>A</h2>"));
        let copy = original.clone();
        let _ = resolve(&original);
        assert_eq!(original, copy);
    }

    #[test]
    fn gate_warn_passes() {
        let findings = vec![UnresolvedEntry {
            entry: TocEntry {
                position: 0,
                title: "X".into(),
                anchor_id: "x".into(),
            },
            reason: UnresolvedReason::MissingAnchor,
        }];

        assert!(gate(&findings, GatePolicy::Warn).is_ok());
        assert_eq!(
            gate(&findings, GatePolicy::Reject),
            Err(ResolveError::Unresolved(findings.clone()))
        );
        assert!(gate(&[], GatePolicy::Reject).is_ok());
    }

    #[test]
    fn gate_policy_parses() {
        assert_eq!("warn".parse::<GatePolicy>(), Ok(GatePolicy::Warn));
        assert_eq!("Reject".parse::<GatePolicy>(), Ok(GatePolicy::Reject));
        assert!("maybe".parse::<GatePolicy>().is_err());
    }
}
