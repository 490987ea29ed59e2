//! In-memory collection store
//!
//! The store owns every document it holds. Inserts clone the caller's
//! documents, so later changes on the caller's side never reach stored
//! state, and readers only ever get shared borrows of the store's copies.

use std::collections::HashMap;

use bson::Document;

/// Named, ordered, schema-less sequence of documents
#[derive(Debug, Clone, Default)]
pub struct Collection {
    documents: Vec<Document>,
}

impl Collection {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// All collections, keyed by fully-qualified name (`db.collection`)
#[derive(Debug, Default)]
pub struct CollectionStore {
    collections: HashMap<String, Collection>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append copies of `documents` to `name`, creating the collection on
    /// first use. An empty batch creates nothing.
    pub fn insert(&mut self, name: &str, documents: &[Document]) {
        if documents.is_empty() {
            return;
        }

        let collection = self.collections.entry(name.to_string()).or_default();
        collection.documents.extend(documents.iter().cloned());
    }

    /// Documents of `name` in insertion order; empty for unknown names
    pub fn get(&self, name: &str) -> &[Document] {
        self.collections
            .get(name)
            .map(Collection::documents)
            .unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.collections.get(name).map_or(0, Collection::len)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Fully-qualified names of every collection, sorted
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
