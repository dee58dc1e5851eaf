//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init` |
//! | Document | Single-document transforms | `slug`, `assign`, `toc`, `check` |
//! | Links | Cross-document hrefs | `link <uid> --anchor <id>` |
//! | Registry | Heading snapshots per document | `registry backfill`, `registry search` |
//!
//! Document commands work outside a project with default settings; inside
//! one they follow `.docanchor/config.toml`.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! docanchor --verbose registry backfill
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod document_cmd;
mod link_cmd;
mod output;
mod registry_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
