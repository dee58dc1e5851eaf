//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{
    backfill_registry, BackfillOptions, BackfillReport, Config, DirectorySource,
    JsonlRegistryStore, RegistryIndex, RegistryStore,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a doc-anchors project. Run 'docanchor init' first.")]
    NotInProject,
}

/// A doc-anchors project: a directory containing `.docanchor/`
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".docanchor").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(".docanchor");

        fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create .docanchor directory: {}", data_dir.display())
        })?;

        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# doc-anchors configuration

# Environment links are built for: content_library, knowledge_base, dev_docs
# (DOCANCHOR_ENV overrides this)
environment = "content_library"

[anchors]
max_length = 60
preserve_existing = true

[toc]
max_level = 6
gate = "warn"

[routes]
# knowledge_base = "/kb/articles/{doc_slug}-{doc_uid}"

[backfill]
documents_dir = "docs"
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = data_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# SQLite index (regenerated from registry.jsonl)
.cache/

# Lock and temp files
*.lock
*.tmp
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .docanchor directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(".docanchor")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Returns the registry store (source of truth)
    pub fn registry_store(&self) -> JsonlRegistryStore {
        JsonlRegistryStore::for_project(&self.root)
    }

    /// Returns the configured documents directory
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.backfill.documents_dir)
    }

    /// Returns the document source for backfills
    pub fn documents(&self) -> DirectorySource {
        DirectorySource::new(self.documents_dir())
    }

    /// Opens the registry index for this project
    pub fn index(&self) -> Result<RegistryIndex> {
        RegistryIndex::open(&self.root)
    }

    /// Rebuilds the index from the registry file
    pub fn rebuild_index(&self) -> Result<RegistryIndex> {
        let mut index = self.index()?;
        index.rebuild(&self.registry_store().list()?)?;
        Ok(index)
    }

    /// Gets the index if it's fresh, or rebuilds it if stale
    pub fn get_or_rebuild_index(&self) -> Result<RegistryIndex> {
        let mut index = self.index()?;

        if index.is_stale()? {
            index.rebuild(&self.registry_store().list()?)?;
        }

        Ok(index)
    }

    /// Backfills the registry from the documents directory
    pub fn backfill(&self, options: &BackfillOptions) -> Result<BackfillReport> {
        backfill_registry(&self.documents(), &self.registry_store(), options)
    }

    /// Returns a relative path from the project root
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(|p| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BatchSelector;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.data_dir().is_dir());
        assert!(project.data_dir().join("config.toml").is_file());
        assert!(project.data_dir().join(".gitignore").is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Project::init(dir.path()).unwrap();
        Project::init(dir.path()).unwrap(); // Should not fail

        assert!(dir.path().join(".docanchor").is_dir());
    }

    #[test]
    fn default_config_file_parses() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert_eq!(project.config().project.anchors.max_length, 60);
        assert_eq!(
            project.documents_dir(),
            dir.path().join("docs")
        );
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Project::open(dir.path()).is_err());
    }

    #[test]
    fn backfill_then_index() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();
        fs::create_dir_all(project.documents_dir()).unwrap();
        fs::write(
            project.documents_dir().join("setup.html"),
            "<h1>Setup</h1><h2>Install the CLI</h2>",
        )
        .unwrap();

        let report = project
            .backfill(&BackfillOptions {
                selector: BatchSelector::Missing,
                limit: None,
            })
            .unwrap();
        assert_eq!(report.succeeded, 1);

        let index = project.get_or_rebuild_index().unwrap();
        assert_eq!(index.entry_count().unwrap(), 1);
        let hits = index.search("install").unwrap();
        assert_eq!(hits[0].anchor_id, "install-the-cli");
    }

    #[test]
    fn relative_path() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        let abs_path = dir.path().join("sub").join("file.txt");
        let rel_path = project.relative_path(&abs_path);

        assert_eq!(rel_path, Some(PathBuf::from("sub/file.txt")));
    }
}
