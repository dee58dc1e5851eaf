//! doc-anchors - heading anchors, tables of contents and cross-document links
//!
//! Every heading in an HTML document gets a stable, unique, URL-safe anchor.
//! A table of contents is built from the anchored headings and checked so
//! that every entry resolves. A per-document registry snapshots the headings
//! so other documents can link into them, with hrefs built per deployment
//! environment.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{
    assign_heading_ids, build_minitoc, build_toc, resolve, slug, DocUid, Document, Heading,
    RegistryEntry, Toc,
};
