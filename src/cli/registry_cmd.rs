//! Registry CLI commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use super::document_cmd::read_input;
use super::output::Output;
use crate::domain::{content_hash, DocUid, Document, RegistryEntry};
use crate::storage::{
    backfill_registry, get_registry, BackfillOptions, BatchSelector, DirectorySource, Project,
    RegistryStore,
};

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Extract the heading registry of a document
    Extract {
        /// HTML file ("-" for stdin)
        file: PathBuf,

        /// Store the entry in the project registry under this key
        #[arg(long)]
        register: Option<String>,
    },

    /// Show the registry entry for a document uid
    Get {
        /// Document uid
        uid: String,
    },

    /// List registered documents
    List,

    /// Register documents from the documents directory
    Backfill {
        /// Rebuild every document, not only unregistered ones
        #[arg(long, conflicts_with = "key")]
        all: bool,

        /// Only these document keys (repeatable)
        #[arg(long)]
        key: Vec<String>,

        /// Maximum number of documents to rebuild
        #[arg(long)]
        limit: Option<usize>,

        /// Documents directory (defaults to [backfill] documents_dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Search registered headings
    Search {
        /// Search query
        query: String,
    },
}

pub fn run(cmd: RegistryCommands, output: &Output) -> Result<()> {
    match cmd {
        RegistryCommands::Extract { file, register } => extract(output, &file, register),
        RegistryCommands::Get { uid } => get(output, &uid),
        RegistryCommands::List => list(output),
        RegistryCommands::Backfill {
            all,
            key,
            limit,
            dir,
        } => {
            let selector = if all {
                BatchSelector::All
            } else if !key.is_empty() {
                BatchSelector::Keys(key)
            } else {
                BatchSelector::Missing
            };
            backfill(output, BackfillOptions { selector, limit }, dir)
        }
        RegistryCommands::Search { query } => search(output, &query),
    }
}

fn extract(output: &Output, file: &Path, register: Option<String>) -> Result<()> {
    let html = read_input(file)?;
    let document =
        Document::parse(&html).with_context(|| format!("Malformed document: {}", file.display()))?;

    let entry = match register {
        Some(key) => {
            let project = Project::open_current()?;
            let store = project.registry_store();
            let doc_uid = store
                .find_by_key(&key)?
                .map(|e| e.doc_uid)
                .unwrap_or_else(DocUid::generate);
            output.verbose_ctx("extract", &format!("Registering {} as {}", key, doc_uid));

            let entry = RegistryEntry::from_document(doc_uid, key, &document, content_hash(&html));
            store.put(&entry)?;
            entry
        }
        None => {
            let key = file.display().to_string();
            RegistryEntry::from_document(DocUid::generate(), key, &document, content_hash(&html))
        }
    };

    if output.is_json() {
        output.data(&entry);
    } else {
        print_entry(&entry);
    }

    Ok(())
}

fn get(output: &Output, uid: &str) -> Result<()> {
    let doc_uid: DocUid = uid.parse().with_context(|| format!("Invalid uid: {}", uid))?;
    let project = Project::open_current()?;

    let entry = get_registry(&project.registry_store(), &doc_uid)?;

    match (&entry, output.is_json()) {
        (_, true) => output.data(&entry),
        (Some(entry), false) => print_entry(entry),
        (None, false) => println!("No registry entry for {}", doc_uid),
    }

    Ok(())
}

fn list(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let entries = project.registry_store().list()?;

    if output.is_json() {
        let items: Vec<_> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "doc_uid": e.doc_uid,
                    "doc_slug": e.doc_slug,
                    "source_key": e.source_key,
                    "title": e.title,
                    "headings": e.headings.len(),
                })
            })
            .collect();
        output.data(&items);
    } else if entries.is_empty() {
        println!("No registered documents.");
    } else {
        println!("{:<28} {:<24} TITLE", "UID", "KEY");
        println!("{}", "-".repeat(80));
        for entry in &entries {
            println!("{:<28} {:<24} {}", entry.doc_uid, entry.source_key, entry.title);
        }
    }

    Ok(())
}

fn backfill(output: &Output, options: BackfillOptions, dir: Option<PathBuf>) -> Result<()> {
    let project = Project::open_current()?;
    let source = match dir {
        Some(dir) => DirectorySource::new(dir),
        None => project.documents(),
    };
    output.verbose_ctx(
        "backfill",
        &format!("Reading documents from {}", source.root().display()),
    );

    let start = std::time::Instant::now();
    let report = backfill_registry(&source, &project.registry_store(), &options)?;
    let duration = start.elapsed();

    if output.is_json() {
        output.data(&report);
    } else {
        for failure in &report.failed {
            output.warning(&format!("{}: {}", failure.key, failure.error));
        }
        output.success(&format!(
            "Backfill finished in {:?}: {} registered, {} skipped, {} failed",
            duration,
            report.succeeded,
            report.skipped,
            report.failed.len()
        ));
    }

    Ok(())
}

fn search(output: &Output, query: &str) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("search", &format!("Searching for: {}", query));

    // Ensure index is up to date
    let index = project.get_or_rebuild_index()?;

    let hits = index.search(query)?;
    output.verbose_ctx("search", &format!("Found {} results", hits.len()));

    if output.is_json() {
        output.data(&hits);
    } else if hits.is_empty() {
        println!("No headings found for '{}'", query);
    } else {
        println!("{:<28} {:<28} HEADING", "UID", "ANCHOR");
        println!("{}", "-".repeat(80));
        for hit in &hits {
            println!("{:<28} {:<28} {} ({})", hit.doc_uid, hit.anchor_id, hit.text, hit.doc_title);
        }
        println!();
        println!("Found {} heading(s)", hits.len());
    }

    Ok(())
}

fn print_entry(entry: &RegistryEntry) {
    println!("{} {}", entry.doc_uid, entry.title);
    println!("  key:  {}", entry.source_key);
    println!("  slug: {}", entry.doc_slug);
    for heading in &entry.headings {
        println!(
            "  {}h{} #{} {}",
            "  ".repeat(heading.level.saturating_sub(1) as usize),
            heading.level,
            heading.anchor_id,
            heading.text
        );
    }
}
