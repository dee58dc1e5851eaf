//! SQLite registry index
//!
//! The index sits in `.docanchor/.cache/registry.db` and mirrors the JSONL
//! registry (the source of truth). It adds full-text search over heading text
//! so callers can find a link target without knowing its anchor. Staleness is
//! judged by comparing the registry file's mtime with the last rebuild.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::store::RegistryStore;
use crate::domain::{DocUid, RegistryEntry};

/// SQLite-backed registry index
pub struct RegistryIndex {
    /// Path to the SQLite database (`None` for in-memory indexes)
    db_path: Option<PathBuf>,

    /// Registry file the index mirrors (for mtime comparison)
    registry_path: Option<PathBuf>,

    conn: Connection,
}

/// A heading matched by [`RegistryIndex::search`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingHit {
    pub doc_uid: String,
    pub doc_title: String,
    pub anchor_id: String,
    pub text: String,
    pub level: u8,
}

impl RegistryIndex {
    /// Schema version - bump when schema changes to force rebuild
    const SCHEMA_VERSION: i32 = 1;

    /// Creates or opens the index for a project
    pub fn open(project_root: &Path) -> Result<Self> {
        let data_dir = project_root.join(".docanchor");
        let cache_dir = data_dir.join(".cache");
        let db_path = cache_dir.join("registry.db");

        fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open registry index: {}", db_path.display()))?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut index = Self {
            db_path: Some(db_path),
            registry_path: Some(data_dir.join("registry.jsonl")),
            conn,
        };
        index.ensure_schema()?;

        Ok(index)
    }

    /// Creates a throwaway in-memory index
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory index")?;
        let mut index = Self {
            db_path: None,
            registry_path: None,
            conn,
        };
        index.ensure_schema()?;
        Ok(index)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        let current_version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);

        if current_version != Self::SCHEMA_VERSION {
            self.create_schema()?;
        }

        Ok(())
    }

    fn create_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            DROP TABLE IF EXISTS headings_fts;
            DROP TABLE IF EXISTS headings;
            DROP TABLE IF EXISTS entries;
            DROP TABLE IF EXISTS cache_meta;

            CREATE TABLE entries (
                doc_uid TEXT PRIMARY KEY,
                source_key TEXT NOT NULL UNIQUE,
                doc_slug TEXT NOT NULL,
                title TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                entry_json TEXT NOT NULL
            );

            CREATE TABLE headings (
                doc_uid TEXT NOT NULL,
                position INTEGER NOT NULL,
                anchor_id TEXT NOT NULL,
                text TEXT NOT NULL,
                level INTEGER NOT NULL,
                PRIMARY KEY (doc_uid, position)
            );

            CREATE TABLE cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX idx_headings_anchor ON headings(anchor_id);

            CREATE VIRTUAL TABLE headings_fts USING fts5(
                doc_uid UNINDEXED,
                anchor_id,
                text,
                content='headings',
                content_rowid='rowid'
            );

            CREATE TRIGGER headings_ai AFTER INSERT ON headings BEGIN
                INSERT INTO headings_fts(rowid, doc_uid, anchor_id, text)
                VALUES (NEW.rowid, NEW.doc_uid, NEW.anchor_id, NEW.text);
            END;

            CREATE TRIGGER headings_ad AFTER DELETE ON headings BEGIN
                INSERT INTO headings_fts(headings_fts, rowid, doc_uid, anchor_id, text)
                VALUES ('delete', OLD.rowid, OLD.doc_uid, OLD.anchor_id, OLD.text);
            END;
            ",
        )?;

        self.conn.execute(
            &format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION),
            [],
        )?;

        Ok(())
    }

    /// Checks if the index is older than the registry file
    pub fn is_stale(&self) -> Result<bool> {
        let Some(registry_path) = &self.registry_path else {
            return Ok(false);
        };
        if !registry_path.exists() {
            return Ok(false);
        }

        let registry_ms = millis(fs::metadata(registry_path)?.modified()?);
        let rebuilt_ms: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = 'last_rebuild_ms'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match rebuilt_ms.and_then(|s| s.parse::<u128>().ok()) {
            Some(rebuilt) => registry_ms > rebuilt,
            None => true,
        })
    }

    /// Rebuilds the index from a full set of entries
    pub fn rebuild(&mut self, entries: &[RegistryEntry]) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM headings", [])?;
        tx.execute("DELETE FROM entries", [])?;

        for entry in entries {
            insert_entry(&tx, entry)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES ('last_rebuild_ms', ?1)",
            params![millis(SystemTime::now()).to_string()],
        )?;

        tx.commit()?;
        tracing::debug!(entries = entries.len(), "rebuilt registry index");

        Ok(())
    }

    /// Full-text search over heading text and anchors (prefix match per term)
    pub fn search(&self, query: &str) -> Result<Vec<HeadingHit>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare(
            "SELECT h.doc_uid, e.title, h.anchor_id, h.text, h.level
             FROM headings_fts f
             JOIN headings h ON h.rowid = f.rowid
             JOIN entries e ON e.doc_uid = h.doc_uid
             WHERE headings_fts MATCH ?1
             ORDER BY rank LIMIT 50",
        )?;

        let hits = stmt
            .query_map(params![fts_query], |row| {
                Ok(HeadingHit {
                    doc_uid: row.get(0)?,
                    doc_title: row.get(1)?,
                    anchor_id: row.get(2)?,
                    text: row.get(3)?,
                    level: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    /// Number of indexed documents
    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns the path to the index database, if on disk
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn load_where(&self, column: &str, value: &str) -> Result<Option<RegistryEntry>> {
        let json: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT entry_json FROM entries WHERE {} = ?1", column),
                params![value],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).context("Failed to parse indexed registry entry"))
            .transpose()
    }
}

impl RegistryStore for RegistryIndex {
    fn get(&self, doc_uid: &DocUid) -> Result<Option<RegistryEntry>> {
        self.load_where("doc_uid", doc_uid.as_str())
    }

    fn put(&self, entry: &RegistryEntry) -> Result<()> {
        self.put_many(std::slice::from_ref(entry))
    }

    fn put_many(&self, batch: &[RegistryEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for entry in batch {
            replace_entry(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn find_by_key(&self, source_key: &str) -> Result<Option<RegistryEntry>> {
        self.load_where("source_key", source_key)
    }

    fn list(&self) -> Result<Vec<RegistryEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_json FROM entries ORDER BY doc_uid")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|j| serde_json::from_str(j).context("Failed to parse indexed registry entry"))
            .collect()
    }
}

fn replace_entry(conn: &Connection, entry: &RegistryEntry) -> Result<()> {
    // Entries previously registered under the same source key
    conn.execute(
        "DELETE FROM headings WHERE doc_uid IN
            (SELECT doc_uid FROM entries WHERE source_key = ?1 AND doc_uid != ?2)",
        params![entry.source_key, entry.doc_uid.as_str()],
    )?;
    conn.execute(
        "DELETE FROM entries WHERE source_key = ?1 AND doc_uid != ?2",
        params![entry.source_key, entry.doc_uid.as_str()],
    )?;

    conn.execute(
        "DELETE FROM headings WHERE doc_uid = ?1",
        params![entry.doc_uid.as_str()],
    )?;
    conn.execute(
        "DELETE FROM entries WHERE doc_uid = ?1",
        params![entry.doc_uid.as_str()],
    )?;
    insert_entry(conn, entry)
}

fn insert_entry(conn: &Connection, entry: &RegistryEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO entries (doc_uid, source_key, doc_slug, title, updated_at, entry_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.doc_uid.as_str(),
            entry.source_key,
            entry.doc_slug,
            entry.title,
            entry.updated_at.to_rfc3339(),
            serde_json::to_string(entry)?,
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO headings (doc_uid, position, anchor_id, text, level)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, heading) in entry.headings.iter().enumerate() {
        stmt.execute(params![
            entry.doc_uid.as_str(),
            position as i64,
            heading.anchor_id,
            heading.text,
            heading.level,
        ])?;
    }

    Ok(())
}

/// Quotes each term so user input cannot inject FTS5 syntax
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
