//! # redb-backed Document Storage
//!
//! A disk-backed document store using the redb embedded database.
//!
//! redb provides ACID transactions, copy-on-write crash safety and MVCC
//! (concurrent readers, single writer). Each `insert_batch` call is one
//! write transaction, so a failing document rolls back the whole batch.
//!
//! ## Layout
//!
//! - `catalog`: collection name -> postcard-encoded [`CatalogEntry`]
//! - `documents`: (collection id, slot) -> JSON document bytes
//! - `handles`: `<collection>/<key>` -> slot
//! - `metadata`: counters
//!
//! Slots increase monotonically per collection, so a range scan over
//! `(collection id, 0..)` yields documents in insertion order.

use crate::store::{DocumentStore, prepare_document};
use crate::types::{
    CasegraphError, CollectionInfo, CollectionKind, Document, DocumentHandle, KEY_FIELD,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Table for the collection catalog: name -> serialized CatalogEntry.
const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog");

/// Table for documents: (collection_id, slot) -> JSON bytes.
const DOCUMENTS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("documents");

/// Table for the handle index: "<collection>/<key>" -> slot.
const HANDLES: TableDefinition<&str, u64> = TableDefinition::new("handles");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Persisted description of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CatalogEntry {
    /// Numeric id used in the documents table key.
    id: u64,
    kind: CollectionKind,
    /// Next generated `_key`.
    next_key: u64,
    /// Next storage slot.
    next_slot: u64,
    count: u64,
}

impl CatalogEntry {
    fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            kind: self.kind,
            count: self.count as usize,
        }
    }
}

fn io_err(e: impl std::fmt::Display) -> CasegraphError {
    CasegraphError::IoError(e.to_string())
}

/// A disk-backed document store using redb.
///
/// The catalog is mirrored in memory for cheap collection lookups; it is
/// only updated after a successful commit.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// In-memory mirror of the catalog table.
    catalog: BTreeMap<String, CatalogEntry>,
    /// Next available collection id.
    next_collection_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("collections", &self.catalog.len())
            .field("next_collection_id", &self.next_collection_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CasegraphError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(CATALOG).map_err(io_err)?;
            let _ = write_txn.open_table(DOCUMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(HANDLES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let read_txn = db.begin_read().map_err(io_err)?;

        let next_collection_id = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get("next_collection_id")
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let catalog = {
            let table = read_txn.open_table(CATALOG).map_err(io_err)?;
            let mut catalog = BTreeMap::new();
            for entry in table.iter().map_err(io_err)? {
                let (name, bytes) = entry.map_err(io_err)?;
                let parsed: CatalogEntry = postcard::from_bytes(bytes.value())
                    .map_err(|e| CasegraphError::DeserializationError(e.to_string()))?;
                catalog.insert(name.value().to_string(), parsed);
            }
            catalog
        };

        Ok(Self {
            db,
            catalog,
            next_collection_id,
        })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), CasegraphError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<&CatalogEntry, CasegraphError> {
        self.catalog
            .get(name)
            .ok_or_else(|| CasegraphError::CollectionNotFound(name.to_string()))
    }
}

fn decode_document(bytes: &[u8]) -> Result<Document, CasegraphError> {
    serde_json::from_slice(bytes).map_err(|e| CasegraphError::DeserializationError(e.to_string()))
}

// =============================================================================
// DOCUMENTSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl DocumentStore for RedbStore {
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
        if self.catalog.contains_key(name) {
            return Ok(false);
        }

        let entry = CatalogEntry {
            id: self.next_collection_id,
            kind,
            next_key: 1,
            next_slot: 0,
            count: 0,
        };
        let next_collection_id = self.next_collection_id.saturating_add(1);
        let bytes = postcard::to_allocvec(&entry)
            .map_err(|e| CasegraphError::SerializationError(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut catalog_table = write_txn.open_table(CATALOG).map_err(io_err)?;
            catalog_table
                .insert(name, bytes.as_slice())
                .map_err(io_err)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;
            meta_table
                .insert("next_collection_id", next_collection_id)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        self.catalog.insert(name.to_string(), entry);
        self.next_collection_id = next_collection_id;
        Ok(true)
    }

    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>, CasegraphError> {
        Ok(self.catalog.get(name).map(|entry| entry.info(name)))
    }

    fn collections(&self) -> Result<Vec<CollectionInfo>, CasegraphError> {
        Ok(self
            .catalog
            .iter()
            .map(|(name, entry)| entry.info(name))
            .collect())
    }

    fn insert_batch(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>, CasegraphError> {
        let mut entry = self.entry(collection)?.clone();
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let write_txn = self.db.begin_write().map_err(io_err)?;
        let mut stored = Vec::with_capacity(documents.len());
        {
            let mut docs_table = write_txn.open_table(DOCUMENTS).map_err(io_err)?;
            let mut handles_table = write_txn.open_table(HANDLES).map_err(io_err)?;
            let mut catalog_table = write_txn.open_table(CATALOG).map_err(io_err)?;

            // Pass 1: validate and assign keys against the committed index
            // plus the keys claimed earlier in this batch.
            let mut batch_keys: BTreeSet<String> = BTreeSet::new();
            for document in documents {
                let is_taken = |key: &str| -> Result<bool, CasegraphError> {
                    if batch_keys.contains(key) {
                        return Ok(true);
                    }
                    let handle = DocumentHandle::new(collection, key).to_string();
                    Ok(handles_table.get(handle.as_str()).map_err(io_err)?.is_some())
                };
                let doc = prepare_document(
                    collection,
                    entry.kind,
                    document,
                    &mut entry.next_key,
                    &is_taken,
                )?;
                if let Some(Value::String(key)) = doc.get(KEY_FIELD) {
                    batch_keys.insert(key.clone());
                }
                stored.push(doc);
            }

            // Pass 2: write documents and index entries.
            for doc in &stored {
                let slot = entry.next_slot;
                entry.next_slot = entry.next_slot.saturating_add(1);
                entry.count = entry.count.saturating_add(1);

                let bytes = serde_json::to_vec(doc)
                    .map_err(|e| CasegraphError::SerializationError(e.to_string()))?;
                docs_table
                    .insert((entry.id, slot), bytes.as_slice())
                    .map_err(io_err)?;

                if let Some(Value::String(key)) = doc.get(KEY_FIELD) {
                    let handle = DocumentHandle::new(collection, key.as_str()).to_string();
                    handles_table
                        .insert(handle.as_str(), slot)
                        .map_err(io_err)?;
                }
            }

            let entry_bytes = postcard::to_allocvec(&entry)
                .map_err(|e| CasegraphError::SerializationError(e.to_string()))?;
            catalog_table
                .insert(collection, entry_bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        // Update in-memory state only after successful commit.
        self.catalog.insert(collection.to_string(), entry);

        Ok(stored)
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, CasegraphError> {
        let entry = self.entry(collection)?;
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let handles_table = read_txn.open_table(HANDLES).map_err(io_err)?;
        let docs_table = read_txn.open_table(DOCUMENTS).map_err(io_err)?;

        let handle = DocumentHandle::new(collection, key).to_string();
        let Some(slot) = handles_table
            .get(handle.as_str())
            .map_err(io_err)?
            .map(|v| v.value())
        else {
            return Ok(None);
        };

        let document = docs_table
            .get((entry.id, slot))
            .map_err(io_err)?
            .map(|bytes| decode_document(bytes.value()))
            .transpose()?;
        Ok(document)
    }

    fn scan(&self, collection: &str) -> Result<Vec<Document>, CasegraphError> {
        let entry = self.entry(collection)?;
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let docs_table = read_txn.open_table(DOCUMENTS).map_err(io_err)?;

        let mut documents = Vec::with_capacity(entry.count as usize);
        for item in docs_table
            .range((entry.id, 0u64)..=(entry.id, u64::MAX))
            .map_err(io_err)?
        {
            let (_, bytes) = item.map_err(io_err)?;
            documents.push(decode_document(bytes.value())?);
        }
        Ok(documents)
    }
}
