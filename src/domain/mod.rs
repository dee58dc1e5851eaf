//! Domain logic for doc-anchors
//!
//! Pure, synchronous transformations over one document at a time. Nothing
//! here touches the filesystem.

mod assign;
mod document;
mod heading;
mod id;
mod link;
mod pipeline;
mod registry;
mod resolve;
mod slug;
mod toc;

pub use assign::{assign_heading_ids, assign_heading_ids_with, AssignOptions, DEFAULT_ANCHOR_MAX_LENGTH};
pub use document::{escape_html, text_content, Document, DocumentError, TOC_MARKER_ATTR};
pub use heading::{validate_heading_ladder, Heading, LadderViolation};
pub use id::{generate_doc_uid, DocUid, IdError};
pub use link::{
    build_entry_href, build_href, build_link, build_link_for, get_default_route_map, Environment,
    LinkError, RouteMap, ENVIRONMENT_VAR,
};
pub use pipeline::{process_document, process_html, PipelineError, PipelineOptions, ProcessedDocument};
pub use registry::{
    content_hash, extract_headings_registry, generate_doc_slug, HeadingSnapshot, RegistryEntry,
    DOC_SLUG_MAX_LENGTH,
};
pub use resolve::{
    gate, resolve, resolve_fragment_links, GatePolicy, ResolveError, UnresolvedEntry,
    UnresolvedReason,
};
pub use slug::{is_slug, normalize, slug, FALLBACK_SLUG};
pub use toc::{
    build_minitoc, build_minitoc_with, build_toc, parse_toc_entries, Toc, TocEntry, TocNode,
    TocOptions,
};
