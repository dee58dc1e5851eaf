//! JSONL storage for registry entries
//!
//! Entries are stored in `.docanchor/registry.jsonl` with one JSON object per
//! line, sorted by uid. Read-modify-write cycles hold an exclusive lock on a
//! sidecar `.lock` file; rewrites go through a temp file and an atomic rename.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::store::RegistryStore;
use crate::domain::{DocUid, RegistryEntry};

/// Store for registry entries in JSONL format
pub struct JsonlRegistryStore {
    path: PathBuf,
}

impl JsonlRegistryStore {
    /// Creates a new registry store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".docanchor").join("registry.jsonl"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.lock")
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    /// Acquires the exclusive read-modify-write lock; released on drop
    fn lock(&self) -> Result<File> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire write lock on registry")?;
        Ok(file)
    }

    /// Reads all entries from the store
    pub fn read_all(&self) -> Result<HashMap<DocUid, RegistryEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open registry: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on registry")?;

        let reader = BufReader::new(&file);
        let mut entries = HashMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: RegistryEntry = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse registry entry at line {}", line_num + 1))?;

            // A uid repeated in a hand-edited file keeps its last line
            entries.insert(entry.doc_uid.clone(), entry);
        }

        Ok(entries)
    }

    /// Writes all entries to the store (full rewrite)
    pub fn write_all(&self, entries: &HashMap<DocUid, RegistryEntry>) -> Result<()> {
        self.ensure_parent()?;

        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            let mut writer = BufWriter::new(&file);

            let mut sorted: Vec<_> = entries.values().collect();
            sorted.sort_by(|a, b| a.doc_uid.cmp(&b.doc_uid));

            for entry in sorted {
                let line =
                    serde_json::to_string(entry).context("Failed to serialize registry entry")?;
                writeln!(writer, "{}", line).context("Failed to write registry entry")?;
            }

            writer.flush().context("Failed to flush registry")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

impl RegistryStore for JsonlRegistryStore {
    fn get(&self, doc_uid: &DocUid) -> Result<Option<RegistryEntry>> {
        Ok(self.read_all()?.remove(doc_uid))
    }

    fn put(&self, entry: &RegistryEntry) -> Result<()> {
        self.put_many(std::slice::from_ref(entry))
    }

    /// Replaces several entries in one read-modify-write cycle
    fn put_many(&self, batch: &[RegistryEntry]) -> Result<()> {
        let _lock = self.lock()?;
        let mut entries = self.read_all()?;

        for entry in batch {
            entries.retain(|uid, e| uid == &entry.doc_uid || e.source_key != entry.source_key);
            entries.insert(entry.doc_uid.clone(), entry.clone());
        }

        self.write_all(&entries)
    }

    fn find_by_key(&self, source_key: &str) -> Result<Option<RegistryEntry>> {
        Ok(self
            .read_all()?
            .into_values()
            .find(|e| e.source_key == source_key))
    }

    fn list(&self) -> Result<Vec<RegistryEntry>> {
        let mut all: Vec<_> = self.read_all()?.into_values().collect();
        all.sort_by(|a, b| a.doc_uid.cmp(&b.doc_uid));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_entry(key: &str) -> RegistryEntry {
        RegistryEntry::build(
            DocUid::generate(),
            key,
            &format!("<h1>{}</h1><h2>Intro</h2>", key),
        )
        .unwrap()
    }

    #[test]
    fn read_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("registry.jsonl"));

        assert!(store.read_all().unwrap().is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn put_and_get_entries() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("registry.jsonl"));

        let a = make_entry("a");
        let b = make_entry("b");
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        assert_eq!(store.get(&a.doc_uid).unwrap(), Some(a.clone()));
        assert_eq!(store.find_by_key("b").unwrap(), Some(b));
        assert!(store.get(&DocUid::generate()).unwrap().is_none());
    }

    #[test]
    fn put_is_full_replace() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("registry.jsonl"));

        let mut entry = make_entry("a");
        store.put(&entry).unwrap();

        entry.title = "Renamed".to_string();
        entry.headings.clear();
        store.put(&entry).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
        assert!(all[0].headings.is_empty());
    }

    #[test]
    fn list_is_sorted_by_uid() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("registry.jsonl"));

        let first = make_entry("first");
        let second = make_entry("second");
        store.put_many(&[second.clone(), first.clone()]).unwrap();

        let keys: Vec<_> = store.list().unwrap().into_iter().map(|e| e.source_key).collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[test]
    fn last_line_wins_for_repeated_uid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.jsonl");
        let store = JsonlRegistryStore::new(&path);

        let mut entry = make_entry("a");
        let first = serde_json::to_string(&entry).unwrap();
        entry.title = "Edited".to_string();
        let second = serde_json::to_string(&entry).unwrap();
        fs::write(&path, format!("{}\n\n{}\n", first, second)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Edited");
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("nested").join("dir").join("registry.jsonl"));

        store.put(&make_entry("a")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn atomic_write() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRegistryStore::new(dir.path().join("registry.jsonl"));

        store.put(&make_entry("a")).unwrap();

        let temp_path = store.path().with_extension("jsonl.tmp");
        assert!(!temp_path.exists());
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.jsonl");
        fs::write(&path, "{not json}\n").unwrap();

        let err = JsonlRegistryStore::new(&path).read_all().unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }
}
