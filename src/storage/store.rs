//! Registry store abstraction
//!
//! The registry is a key-value mapping from [`DocUid`] to [`RegistryEntry`].
//! Writes are full replacements (last writer wins); there is no field-level
//! merge. Two processes must not backfill the same document concurrently
//! without external serialization.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::domain::{build_entry_href, DocUid, LinkError, RegistryEntry, RouteMap};

/// Storage backend for registry entries
pub trait RegistryStore {
    /// Point lookup; `Ok(None)` when the document is not registered
    fn get(&self, doc_uid: &DocUid) -> Result<Option<RegistryEntry>>;

    /// Inserts or fully replaces the entry for `entry.doc_uid`.
    ///
    /// Any other entry registered under the same source key is dropped, so a
    /// source key maps to at most one entry.
    fn put(&self, entry: &RegistryEntry) -> Result<()>;

    /// Writes a batch of entries with [`put`](Self::put) semantics.
    ///
    /// Backends override this to write the batch in one pass. On error some
    /// entries of the batch may already be stored.
    fn put_many(&self, batch: &[RegistryEntry]) -> Result<()> {
        batch.iter().try_for_each(|entry| self.put(entry))
    }

    /// Looks up the entry registered for a document-store key
    fn find_by_key(&self, source_key: &str) -> Result<Option<RegistryEntry>>;

    /// All entries, ordered by uid (creation order)
    fn list(&self) -> Result<Vec<RegistryEntry>>;
}

/// Point lookup of a registry entry. Absence is not an error.
pub fn get_registry(store: &dyn RegistryStore, doc_uid: &DocUid) -> Result<Option<RegistryEntry>> {
    store.get(doc_uid)
}

/// Builds links to registered documents, refusing targets the registry does not know
pub struct LinkBuilder<'a> {
    routes: &'a RouteMap,
    store: &'a dyn RegistryStore,
}

impl<'a> LinkBuilder<'a> {
    pub fn new(routes: &'a RouteMap, store: &'a dyn RegistryStore) -> Self {
        Self { routes, store }
    }

    /// Builds an href to `target`, optionally to one of its headings.
    ///
    /// Fails with [`LinkError::UnresolvedTarget`] when `target` is not a
    /// registered uid, and [`LinkError::UnknownAnchor`] when the anchor is not
    /// one of its headings.
    pub fn build_link(&self, target: &str, anchor_id: Option<&str>) -> Result<String, LinkError> {
        let uid: DocUid = target
            .parse()
            .map_err(|_| LinkError::UnresolvedTarget(target.to_string()))?;

        let entry = self
            .store
            .get(&uid)
            .map_err(|e| LinkError::Registry(format!("{:#}", e)))?
            .ok_or_else(|| LinkError::UnresolvedTarget(target.to_string()))?;

        build_entry_href(&entry, anchor_id, self.routes)
    }
}

/// In-memory registry store
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    entries: RwLock<HashMap<DocUid, RegistryEntry>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn get(&self, doc_uid: &DocUid) -> Result<Option<RegistryEntry>> {
        Ok(self.entries.read().get(doc_uid).cloned())
    }

    fn put(&self, entry: &RegistryEntry) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|uid, e| uid == &entry.doc_uid || e.source_key != entry.source_key);
        entries.insert(entry.doc_uid.clone(), entry.clone());
        Ok(())
    }

    fn find_by_key(&self, source_key: &str) -> Result<Option<RegistryEntry>> {
        Ok(self
            .entries
            .read()
            .values()
            .find(|e| e.source_key == source_key)
            .cloned())
    }

    fn list(&self) -> Result<Vec<RegistryEntry>> {
        let mut all: Vec<_> = self.entries.read().values().cloned().collect();
        all.sort_by(|a, b| a.doc_uid.cmp(&b.doc_uid));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{get_default_route_map, Environment};

    fn entry(key: &str, html: &str) -> RegistryEntry {
        RegistryEntry::build(DocUid::generate(), key, html).unwrap()
    }

    #[test]
    fn get_missing_is_none() {
        let store = MemoryRegistryStore::new();
        assert!(get_registry(&store, &DocUid::generate()).unwrap().is_none());
    }

    #[test]
    fn put_and_get() {
        let store = MemoryRegistryStore::new();
        let e = entry("a", "<h1>A</h1>");
        store.put(&e).unwrap();

        assert_eq!(store.get(&e.doc_uid).unwrap(), Some(e.clone()));
        assert_eq!(store.find_by_key("a").unwrap(), Some(e));
        assert!(store.find_by_key("b").unwrap().is_none());
    }

    #[test]
    fn put_replaces_whole_entry() {
        let store = MemoryRegistryStore::new();
        let mut e = entry("a", "<h1>A</h1><h2>Old</h2>");
        store.put(&e).unwrap();

        e.headings.truncate(1);
        store.put(&e).unwrap();

        let loaded = store.get(&e.doc_uid).unwrap().unwrap();
        assert_eq!(loaded.headings.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_keeps_source_keys_unique() {
        let store = MemoryRegistryStore::new();
        let first = entry("a", "<h1>A</h1>");
        let second = entry("a", "<h1>A2</h1>");
        store.put(&first).unwrap();
        store.put(&second).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_key("a").unwrap().unwrap().doc_uid, second.doc_uid);
    }

    #[test]
    fn list_is_sorted_by_uid() {
        let store = MemoryRegistryStore::new();
        let a = entry("a", "<h1>A</h1>");
        let b = entry("b", "<h1>B</h1>");
        store.put(&b).unwrap();
        store.put(&a).unwrap();

        let uids: Vec<_> = store.list().unwrap().into_iter().map(|e| e.doc_uid).collect();
        assert_eq!(uids, vec![a.doc_uid, b.doc_uid]);
    }

    #[test]
    fn link_builder_resolves_registered_targets() {
        let store = MemoryRegistryStore::new();
        let e = entry("guide", "<h1>Guide</h1><h2>Intro</h2>");
        store.put(&e).unwrap();

        let routes = RouteMap::new(Environment::ContentLibrary)
            .with_route(Environment::ContentLibrary, "/docs/{doc_uid}");
        let links = LinkBuilder::new(&routes, &store);

        assert_eq!(
            links.build_link(e.doc_uid.as_str(), Some("intro")).unwrap(),
            format!("/docs/{}#intro", e.doc_uid)
        );
        assert_eq!(
            links.build_link(e.doc_uid.as_str(), None).unwrap(),
            format!("/docs/{}", e.doc_uid)
        );
    }

    #[test]
    fn link_builder_rejects_unknown_targets() {
        let store = MemoryRegistryStore::new();
        let routes = get_default_route_map(Environment::ContentLibrary);
        let links = LinkBuilder::new(&routes, &store);

        let unknown = DocUid::generate();
        assert_eq!(
            links.build_link(unknown.as_str(), Some("intro")),
            Err(LinkError::UnresolvedTarget(unknown.to_string()))
        );
        assert_eq!(
            links.build_link("not-a-uid", None),
            Err(LinkError::UnresolvedTarget("not-a-uid".to_string()))
        );
    }

    #[test]
    fn link_builder_rejects_unknown_anchor() {
        let store = MemoryRegistryStore::new();
        let e = entry("guide", "<h1>Guide</h1>");
        store.put(&e).unwrap();

        let routes = get_default_route_map(Environment::DevDocs);
        let links = LinkBuilder::new(&routes, &store);

        assert!(matches!(
            links.build_link(e.doc_uid.as_str(), Some("missing")),
            Err(LinkError::UnknownAnchor { .. })
        ));
    }
}
