//! # Document Store
//!
//! The storage interface the materializer runs against, plus the in-memory
//! implementation.
//!
//! A store holds named collections of JSON documents. Every stored document
//! carries `_key` and `_id`; documents in edge collections also carry
//! `_from` and `_to`. Scans return documents in insertion order.

use crate::types::{
    CasegraphError, CollectionInfo, CollectionKind, Document, DocumentHandle, FROM_FIELD,
    ID_FIELD, KEY_FIELD, TO_FIELD, validate_key,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DOCUMENTSTORE TRAIT
// =============================================================================

/// The DocumentStore trait defines the storage capabilities the
/// transformation needs: collection management, insert, scan (optionally
/// filtered) and lookup by key or handle.
///
/// All fallible operations return `Result<T, CasegraphError>` so in-memory
/// and persistent backends can be used interchangeably.
pub trait DocumentStore {
    /// Create a collection if it does not exist.
    ///
    /// Returns `true` when the collection was created, `false` when it was
    /// already present (in which case it is left untouched, whatever its kind).
    fn create_collection(
        &mut self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<bool, CasegraphError>;

    /// Describe a collection, or `None` if it does not exist.
    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>, CasegraphError>;

    /// Describe every collection, ordered by name.
    fn collections(&self) -> Result<Vec<CollectionInfo>, CasegraphError>;

    /// Store a batch of documents atomically.
    ///
    /// Either every document is stored or none is. Returns the stored
    /// documents with their system fields filled in, in input order.
    fn insert_batch(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>, CasegraphError>;

    /// Fetch a document by key.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, CasegraphError>;

    /// All documents of a collection in insertion order.
    fn scan(&self, collection: &str) -> Result<Vec<Document>, CasegraphError>;

    /// Store a single document. Returns it with system fields filled in.
    fn insert(
        &mut self,
        collection: &str,
        document: Document,
    ) -> Result<Document, CasegraphError> {
        self.insert_batch(collection, vec![document])?
            .pop()
            .ok_or_else(|| CasegraphError::InvalidDocument("insert produced no document".into()))
    }

    /// Documents of a collection that satisfy `filter`, in insertion order.
    fn scan_filtered(
        &self,
        collection: &str,
        filter: &dyn Fn(&Document) -> bool,
    ) -> Result<Vec<Document>, CasegraphError> {
        Ok(self
            .scan(collection)?
            .into_iter()
            .filter(|doc| filter(doc))
            .collect())
    }

    /// Fetch a document by its `<collection>/<key>` handle.
    ///
    /// Malformed handles and unknown collections resolve to `None`.
    fn get_by_id(&self, id: &str) -> Result<Option<Document>, CasegraphError> {
        let Some(handle) = DocumentHandle::parse(id) else {
            return Ok(None);
        };
        if self.collection(&handle.collection)?.is_none() {
            return Ok(None);
        }
        self.get(&handle.collection, &handle.key)
    }

    /// Number of documents in a collection.
    fn count(&self, collection: &str) -> Result<usize, CasegraphError> {
        self.collection(collection)?
            .map(|info| info.count)
            .ok_or_else(|| CasegraphError::CollectionNotFound(collection.to_string()))
    }
}

// =============================================================================
// SHARED INSERT PREPARATION
// =============================================================================

/// Fill in `_key`/`_id` and validate a document before it is stored.
///
/// `next_seq` supplies the generated key when the document has none; it is
/// advanced only when used. `is_taken` reports keys already present in the
/// collection (including earlier documents of the same batch).
pub(crate) fn prepare_document(
    collection: &str,
    kind: CollectionKind,
    mut document: Document,
    next_seq: &mut u64,
    is_taken: &dyn Fn(&str) -> Result<bool, CasegraphError>,
) -> Result<Document, CasegraphError> {
    let key = match document.get(KEY_FIELD) {
        Some(Value::String(key)) => {
            validate_key(key)?;
            key.clone()
        }
        Some(other) => {
            return Err(CasegraphError::InvalidDocument(format!(
                "_key must be a string, got {}",
                other
            )));
        }
        None => loop {
            let candidate = next_seq.to_string();
            *next_seq = next_seq.saturating_add(1);
            if !is_taken(&candidate)? {
                break candidate;
            }
        },
    };

    if is_taken(&key)? {
        return Err(CasegraphError::UniqueConstraintViolated(format!(
            "{}/{}",
            collection, key
        )));
    }

    if kind == CollectionKind::Edge {
        for field in [FROM_FIELD, TO_FIELD] {
            let valid = document
                .get(field)
                .and_then(Value::as_str)
                .and_then(DocumentHandle::parse)
                .is_some();
            if !valid {
                return Err(CasegraphError::InvalidEdge(format!(
                    "{} is missing or not a <collection>/<key> handle",
                    field
                )));
            }
        }
    }

    let id = DocumentHandle::new(collection, key.as_str()).to_string();
    document.insert(KEY_FIELD.to_string(), Value::String(key));
    document.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(document)
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// One collection held in memory.
#[derive(Debug, Clone)]
struct MemoryCollection {
    kind: CollectionKind,
    /// Insertion sequence -> document.
    documents: BTreeMap<u64, Document>,
    /// `_key` -> insertion sequence.
    keys: BTreeMap<String, u64>,
    /// Next generated key.
    next_seq: u64,
}

impl MemoryCollection {
    fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            documents: BTreeMap::new(),
            keys: BTreeMap::new(),
            next_seq: 1,
        }
    }

    fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            kind: self.kind,
            count: self.documents.len(),
        }
    }
}

/// A volatile document store.
///
/// Uses `BTreeMap` throughout so scans and listings are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, MemoryCollection>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, name: &str) -> Result<&MemoryCollection, CasegraphError> {
        self.collections
            .get(name)
            .ok_or_else(|| CasegraphError::CollectionNotFound(name.to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn create_collection(
        &mut self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<bool, CasegraphError> {
        if name.is_empty() || name.contains('/') {
            return Err(CasegraphError::InvalidDocument(format!(
                "illegal collection name '{}'",
                name
            )));
        }
        if self.collections.contains_key(name) {
            return Ok(false);
        }
        self.collections
            .insert(name.to_string(), MemoryCollection::new(kind));
        Ok(true)
    }

    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>, CasegraphError> {
        Ok(self.collections.get(name).map(|c| c.info(name)))
    }

    fn collections(&self) -> Result<Vec<CollectionInfo>, CasegraphError> {
        Ok(self
            .collections
            .iter()
            .map(|(name, c)| c.info(name))
            .collect())
    }

    fn insert_batch(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>, CasegraphError> {
        let target = self.existing(collection)?;
        let kind = target.kind;

        // Validate the whole batch against a scratch key set before mutating.
        let mut next_seq = target.next_seq;
        let mut batch_keys: BTreeSet<String> = BTreeSet::new();
        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let is_taken =
                |key: &str| Ok(target.keys.contains_key(key) || batch_keys.contains(key));
            let doc = prepare_document(collection, kind, document, &mut next_seq, &is_taken)?;
            if let Some(Value::String(key)) = doc.get(KEY_FIELD) {
                batch_keys.insert(key.clone());
            }
            prepared.push(doc);
        }

        let Some(target) = self.collections.get_mut(collection) else {
            return Err(CasegraphError::CollectionNotFound(collection.to_string()));
        };
        let mut seq = target
            .documents
            .last_key_value()
            .map_or(0, |(last, _)| last.saturating_add(1));
        for doc in &prepared {
            if let Some(Value::String(key)) = doc.get(KEY_FIELD) {
                target.keys.insert(key.clone(), seq);
            }
            target.documents.insert(seq, doc.clone());
            seq = seq.saturating_add(1);
        }
        target.next_seq = next_seq;

        Ok(prepared)
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, CasegraphError> {
        let target = self.existing(collection)?;
        Ok(target
            .keys
            .get(key)
            .and_then(|seq| target.documents.get(seq))
            .cloned())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Document>, CasegraphError> {
        Ok(self
            .existing(collection)?
            .documents
            .values()
            .cloned()
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
