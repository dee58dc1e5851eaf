//! # Storage Layer
//!
//! Persistence for the document registry with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Registry | JSONL (one entry per line) | `.docanchor/registry.jsonl` |
//! | Config | TOML | `.docanchor/config.toml` |
//! | Index | SQLite + FTS5 (auto-regenerated) | `.docanchor/.cache/registry.db` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlRegistryStore`] uses file locking (`fs2`) for read-modify-write
//! - [`RegistryIndex`] uses mtime-based staleness checks
//! - All file writes are atomic (temp file + rename)
//!
//! ## Project Structure
//!
//! ```text
//! .docanchor/
//! ├── registry.jsonl        # Registry entries, sorted by uid
//! ├── config.toml           # Project configuration
//! ├── .cache/registry.db    # Heading search index (ignored)
//! └── .gitignore
//! ```
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a project
//! - [`RegistryStore`] - Registry backend trait
//! - [`DocumentSource`] - Where backfills read documents from
//! - [`Config`] - Project and global configuration

mod backfill;
mod cache;
mod config;
mod documents;
mod jsonl;
mod project;
mod store;

pub use backfill::{
    backfill_registry, BackfillFailure, BackfillOptions, BackfillReport, BatchSelector,
};
pub use cache::{HeadingHit, RegistryIndex};
pub use config::{
    AnchorConfig, BackfillConfig, Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig,
    TocConfig,
};
pub use documents::{DirectorySource, DocumentSource, MemorySource};
pub use jsonl::JsonlRegistryStore;
pub use project::{Project, ProjectError};
pub use store::{get_registry, LinkBuilder, MemoryRegistryStore, RegistryStore};
