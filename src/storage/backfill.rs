//! Batch registry backfill
//!
//! Builds registry entries for many existing documents. A run is safe to
//! repeat: registered documents keep their uid and are skipped or replaced
//! wholesale, never duplicated. One bad document never stops the batch; its
//! failure is recorded and the rest carry on.
//!
//! The registry is read once up front. Entries are built in parallel on the
//! rayon pool and written back in one batch from the calling thread; if the
//! batch write fails, entries are retried one by one so each failure lands on
//! its own document.

use std::collections::HashMap;

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;

use super::documents::DocumentSource;
use super::store::RegistryStore;
use crate::domain::{content_hash, DocUid, RegistryEntry};

/// Which documents a backfill run considers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BatchSelector {
    /// Documents with no registry entry yet
    #[default]
    Missing,

    /// Every document; unchanged ones are skipped
    All,

    /// Only the named keys; unchanged ones are skipped
    Keys(Vec<String>),
}

/// Options for [`backfill_registry`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillOptions {
    pub selector: BatchSelector,

    /// Maximum number of documents to rebuild in this run
    pub limit: Option<usize>,
}

/// A document that could not be registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of a backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Entries written
    pub succeeded: usize,

    /// Documents already registered and unchanged
    pub skipped: usize,

    /// Per-document failures, in key order
    pub failed: Vec<BackfillFailure>,
}

impl BackfillReport {
    /// Keys of the failed documents
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.key.as_str()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Candidate {
    key: String,
    existing: Option<RegistryEntry>,
}

enum Built {
    Entry(RegistryEntry),
    Unchanged,
}

/// Registers documents from `source` into `store`.
///
/// Returns an error only when the set of keys or the registry cannot be
/// read; everything that goes wrong with a single document lands in
/// [`BackfillReport::failed`].
pub fn backfill_registry(
    source: &dyn DocumentSource,
    store: &dyn RegistryStore,
    options: &BackfillOptions,
) -> Result<BackfillReport> {
    let keys = match &options.selector {
        BatchSelector::Keys(keys) => {
            let mut keys = keys.clone();
            keys.sort();
            keys.dedup();
            keys
        }
        BatchSelector::Missing | BatchSelector::All => source.keys()?,
    };

    let mut registered: HashMap<String, RegistryEntry> = store
        .list()?
        .into_iter()
        .map(|e| (e.source_key.clone(), e))
        .collect();

    let mut report = BackfillReport::default();

    let mut candidates = Vec::new();
    for key in keys {
        match registered.remove(&key) {
            Some(_) if options.selector == BatchSelector::Missing => report.skipped += 1,
            existing => candidates.push(Candidate { key, existing }),
        }
    }

    if let Some(limit) = options.limit {
        candidates.truncate(limit);
    }

    tracing::debug!(documents = candidates.len(), "backfilling registry");

    let built: Vec<(String, Result<Built, String>)> = candidates
        .into_par_iter()
        .map(|candidate| {
            let result = build_candidate(source, &candidate);
            (candidate.key, result)
        })
        .collect();

    let mut batch = Vec::new();
    for (key, result) in built {
        match result {
            Ok(Built::Entry(entry)) => batch.push(entry),
            Ok(Built::Unchanged) => report.skipped += 1,
            Err(error) => fail(&mut report, key, error),
        }
    }

    write_batch(store, batch, &mut report);

    report.failed.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(report)
}

fn write_batch(store: &dyn RegistryStore, batch: Vec<RegistryEntry>, report: &mut BackfillReport) {
    if batch.is_empty() {
        return;
    }

    match store.put_many(&batch) {
        Ok(()) => {
            for entry in &batch {
                tracing::debug!(key = %entry.source_key, doc_uid = %entry.doc_uid, "registered document");
            }
            report.succeeded += batch.len();
        }
        Err(e) => {
            tracing::debug!("batch write failed, retrying per document: {:#}", e);
            for entry in batch {
                match store.put(&entry) {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => fail(report, entry.source_key, format!("{:#}", e)),
                }
            }
        }
    }
}

fn build_candidate(source: &dyn DocumentSource, candidate: &Candidate) -> Result<Built, String> {
    let html = source.load(&candidate.key).map_err(|e| format!("{:#}", e))?;

    if let Some(existing) = &candidate.existing {
        if existing.content_hash == content_hash(&html) {
            return Ok(Built::Unchanged);
        }
    }

    let doc_uid = candidate
        .existing
        .as_ref()
        .map(|e| e.doc_uid.clone())
        .unwrap_or_else(DocUid::generate);

    RegistryEntry::build(doc_uid, candidate.key.clone(), &html)
        .map(Built::Entry)
        .map_err(|e| e.to_string())
}

fn fail(report: &mut BackfillReport, key: String, error: String) {
    tracing::warn!(key = %key, "backfill failed: {}", error);
    report.failed.push(BackfillFailure { key, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::documents::MemorySource;
    use crate::storage::store::MemoryRegistryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts store calls and refuses writes for one source key
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRegistryStore,
        reject_key: Option<String>,
        lists: AtomicUsize,
        lookups: AtomicUsize,
        batches: AtomicUsize,
    }

    impl RegistryStore for CountingStore {
        fn get(&self, doc_uid: &DocUid) -> Result<Option<RegistryEntry>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get(doc_uid)
        }

        fn put(&self, entry: &RegistryEntry) -> Result<()> {
            if self.reject_key.as_deref() == Some(entry.source_key.as_str()) {
                anyhow::bail!("disk full");
            }
            self.inner.put(entry)
        }

        fn put_many(&self, batch: &[RegistryEntry]) -> Result<()> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            batch.iter().try_for_each(|entry| self.put(entry))
        }

        fn find_by_key(&self, source_key: &str) -> Result<Option<RegistryEntry>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_key(source_key)
        }

        fn list(&self) -> Result<Vec<RegistryEntry>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list()
        }
    }

    fn source_with(count: usize) -> MemorySource {
        (0..count).fold(MemorySource::new(), |source, i| {
            source.with(
                format!("doc-{:02}", i),
                format!("<h1>Doc {}</h1><h2>Intro</h2>", i),
            )
        })
    }

    #[test]
    fn isolates_malformed_documents() {
        let source = source_with(8)
            .with("doc_id_a", "<h1>Broken</h2>")
            .with("doc_id_b", "<h2>Unclosed");
        let store = MemoryRegistryStore::new();

        let report = backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();

        assert_eq!(report.succeeded, 8);
        assert_eq!(report.failed_keys(), vec!["doc_id_a", "doc_id_b"]);
        assert_eq!(store.len(), 8);
        assert!(store.find_by_key("doc_id_a").unwrap().is_none());
        assert!(store.find_by_key("doc-07").unwrap().is_some());
    }

    #[test]
    fn rerun_skips_registered_documents() {
        let source = source_with(3);
        let store = MemoryRegistryStore::new();

        backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();
        let before = store.list().unwrap();

        let report = backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(store.list().unwrap(), before);
    }

    #[test]
    fn all_replaces_changed_documents_and_keeps_uid() {
        let mut source = source_with(2);
        let store = MemoryRegistryStore::new();
        backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();
        let original = store.find_by_key("doc-00").unwrap().unwrap();

        source.insert("doc-00", "<h1>Doc 0</h1><h2>Changed</h2>");
        let report = backfill_registry(
            &source,
            &store,
            &BackfillOptions {
                selector: BatchSelector::All,
                limit: None,
            },
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.len(), 2);

        let updated = store.find_by_key("doc-00").unwrap().unwrap();
        assert_eq!(updated.doc_uid, original.doc_uid);
        assert!(updated.has_anchor("changed"));
        assert!(!updated.has_anchor("intro"));
    }

    #[test]
    fn keys_selector_and_unknown_keys() {
        let source = source_with(3);
        let store = MemoryRegistryStore::new();

        let report = backfill_registry(
            &source,
            &store,
            &BackfillOptions {
                selector: BatchSelector::Keys(vec!["doc-01".into(), "nope".into()]),
                limit: None,
            },
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed_keys(), vec!["nope"]);
        assert!(store.find_by_key("doc-01").unwrap().is_some());
        assert!(store.find_by_key("doc-00").unwrap().is_none());
    }

    #[test]
    fn limit_bounds_work_per_run() {
        let source = source_with(5);
        let store = MemoryRegistryStore::new();
        let options = BackfillOptions {
            selector: BatchSelector::Missing,
            limit: Some(2),
        };

        let first = backfill_registry(&source, &store, &options).unwrap();
        assert_eq!(first.succeeded, 2);

        let second = backfill_registry(&source, &store, &options).unwrap();
        assert_eq!(second.succeeded, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn empty_source_is_empty_report() {
        let report = backfill_registry(
            &MemorySource::new(),
            &MemoryRegistryStore::new(),
            &BackfillOptions::default(),
        )
        .unwrap();

        assert_eq!(report, BackfillReport::default());
        assert!(report.is_clean());
    }

    #[test]
    fn reads_registry_once_and_writes_one_batch() {
        let source = source_with(20);
        let store = CountingStore::default();

        let report = backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();

        assert_eq!(report.succeeded, 20);
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.batches.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.len(), 20);
    }

    #[test]
    fn failed_batch_write_is_isolated_per_document() {
        let source = source_with(4);
        let store = CountingStore {
            reject_key: Some("doc-02".to_string()),
            ..CountingStore::default()
        };

        let report = backfill_registry(&source, &store, &BackfillOptions::default()).unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed_keys(), vec!["doc-02"]);
        assert!(report.failed[0].error.contains("disk full"));
        assert_eq!(store.inner.len(), 3);
        assert!(store.inner.find_by_key("doc-02").unwrap().is_none());
    }
}
