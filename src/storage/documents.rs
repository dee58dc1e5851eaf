//! Document sources
//!
//! A document source maps keys to HTML markup. The registry only ever reads
//! from it; documents are written by whoever owns them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

/// File extensions treated as documents
const DOCUMENT_EXTENSIONS: &[&str] = &["html", "htm"];

/// Read access to a set of keyed HTML documents
pub trait DocumentSource: Send + Sync {
    /// All document keys, sorted
    fn keys(&self) -> Result<Vec<String>>;

    /// Loads the markup for a key
    fn load(&self, key: &str) -> Result<String>;
}

/// Documents stored as `*.html` files under a directory.
///
/// The key of a file is its path relative to the root, without extension,
/// using `/` separators (`guides/setup.html` has key `guides/setup`).
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return None;
        }

        DOCUMENT_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", key, ext)))
            .find(|p| p.is_file())
    }
}

impl DocumentSource for DirectorySource {
    fn keys(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            bail!("Documents directory not found: {}", self.root.display());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.with_context(|| {
                format!("Failed to walk documents directory: {}", self.root.display())
            })?;

            let is_document = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()));

            if !is_document {
                continue;
            }

            match self.key_for(entry.path()) {
                Some(key) => keys.push(key),
                None => tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 path"),
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn load(&self, key: &str) -> Result<String> {
        let path = self
            .path_for(key)
            .with_context(|| format!("Document not found: {}", key))?;

        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read document: {}", path.display()))
    }
}

/// In-memory document source
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    documents: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, html: impl Into<String>) {
        self.documents.insert(key.into(), html.into());
    }

    pub fn with(mut self, key: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(key, html);
        self
    }
}

impl DocumentSource for MemorySource {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn load(&self, key: &str) -> Result<String> {
        self.documents
            .get(key)
            .cloned()
            .with_context(|| format!("Document not found: {}", key))
    }
}
