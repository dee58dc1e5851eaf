//! Single-document pipeline
//!
//! parse → assign anchors → build table of contents → ladder check →
//! resolver gate. Every step works on the same copy of the document, so the
//! outline and the heading anchors cannot drift apart.

use thiserror::Error;

use super::document::{Document, DocumentError};
use super::heading::{validate_heading_ladder, LadderViolation};
use super::resolve::{gate, resolve, GatePolicy, ResolveError, UnresolvedEntry};
use super::toc::{build_minitoc_with, TocOptions};

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("Malformed document: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Options for [`process_html`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub toc: TocOptions,
    pub gate: GatePolicy,
}

/// Result of running the pipeline on one document
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    /// Document with anchors and a fresh table of contents
    pub document: Document,

    /// Heading-ladder findings (advisory)
    pub ladder: Vec<LadderViolation>,

    /// Resolver findings; empty unless the outline and anchors disagree
    pub unresolved: Vec<UnresolvedEntry>,
}

impl ProcessedDocument {
    /// Returns true if there are no findings of any kind
    pub fn is_clean(&self) -> bool {
        self.ladder.is_empty() && self.unresolved.is_empty()
    }
}

/// Runs the full pipeline on HTML markup
pub fn process_html(html: &str, options: &PipelineOptions) -> Result<ProcessedDocument, PipelineError> {
    let document = Document::parse(html)?;
    process_document(&document, options)
}

/// Runs the full pipeline on a parsed document
pub fn process_document(
    document: &Document,
    options: &PipelineOptions,
) -> Result<ProcessedDocument, PipelineError> {
    let built = build_minitoc_with(document, &options.toc);

    let ladder = validate_heading_ladder(&built.heading_list());
    for violation in &ladder {
        tracing::warn!(position = violation.position, "{}", violation.description);
    }

    let unresolved = resolve(&built);
    gate(&unresolved, options.gate)?;

    Ok(ProcessedDocument {
        document: built,
        ladder,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processes_clean_document() {
        let processed = process_html(
            "<h1>Guide</h1><h2>Setup</h2><h3>Install</h3>",
            &PipelineOptions::default(),
        )
        .unwrap();

        assert!(processed.is_clean());
        assert!(processed.document.toc_block().is_some());
    }

    #[test]
    fn reports_ladder_violations_without_failing() {
        let processed = process_html(
            "<h1>A</h1><h2>B</h2><h4>C</h4>",
            &PipelineOptions {
                gate: GatePolicy::Reject,
                ..PipelineOptions::default()
            },
        )
        .unwrap();

        assert_eq!(processed.ladder.len(), 1);
        assert_eq!(processed.ladder[0].position, 2);
        assert!(processed.unresolved.is_empty());
    }

    #[test]
    fn malformed_markup_is_error() {
        let err = process_html("<h2>x</h1>", &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Document(_)));
    }

    #[test]
    fn pipeline_output_is_stable_under_reprocessing() {
        let options = PipelineOptions::default();
        let first = process_html("<h2>One</h2><h2>One</h2>", &options).unwrap();
        let second = process_html(&first.document.render(), &options).unwrap();

        assert_eq!(first.document.render(), second.document.render());
    }
}
