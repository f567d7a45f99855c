//! # Database
//!
//! A store plus the materializer configured for it: the entry point the
//! app layer calls, one method per operation.
//!
//! ## Storage Backends
//!
//! - `InMemory`: [`MemoryStore`] (fast, volatile)
//! - `Persistent`: [`RedbStore`] (disk-backed, ACID)

use crate::attributes::{self, NamedValue, RelationshipRef};
use crate::pattern::NamePattern;
use crate::primitives::{
    ENTITY_COLLECTION, ENTITY_EDGE_COLLECTION, ENTRY_COLLECTION, ENTRY_EDGE_COLLECTION,
    SOURCE_COLLECTION,
};
use crate::provision::{ProvisionReport, provision};
use crate::resolver::{CaseEdgeRow, IdEdgeRow, KeyEdgeRow, LinkReport, RelationshipResolver};
use crate::storage::RedbStore;
use crate::store::{DocumentStore, MemoryStore};
use crate::synthesizer::{EntitySynthesizer, NgsiNamespace, SynthesisReport};
use crate::tabular::{self, TabularReport};
use crate::types::{CasegraphError, CollectionInfo, CollectionKind, Document};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a [`Database`].
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl DocumentStore for StorageBackend {
    fn create_collection(
        &mut self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<bool, CasegraphError> {
        match self {
            Self::InMemory(s) => s.create_collection(name, kind),
            Self::Persistent(s) => s.create_collection(name, kind),
        }
    }

    fn collection(&self, name: &str) -> Result<Option<CollectionInfo>, CasegraphError> {
        match self {
            Self::InMemory(s) => s.collection(name),
            Self::Persistent(s) => s.collection(name),
        }
    }

    fn collections(&self) -> Result<Vec<CollectionInfo>, CasegraphError> {
        match self {
            Self::InMemory(s) => s.collections(),
            Self::Persistent(s) => s.collections(),
        }
    }

    fn insert_batch(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>, CasegraphError> {
        match self {
            Self::InMemory(s) => s.insert_batch(collection, documents),
            Self::Persistent(s) => s.insert_batch(collection, documents),
        }
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, CasegraphError> {
        match self {
            Self::InMemory(s) => s.get(collection, key),
            Self::Persistent(s) => s.get(collection, key),
        }
    }

    fn scan(&self, collection: &str) -> Result<Vec<Document>, CasegraphError> {
        match self {
            Self::InMemory(s) => s.scan(collection),
            Self::Persistent(s) => s.scan(collection),
        }
    }
}

// =============================================================================
// DATABASE
// =============================================================================

/// The managed collections and the jobs that run over them.
#[derive(Debug, Default)]
pub struct Database {
    backend: StorageBackend,
    synthesizer: EntitySynthesizer,
    resolver: RelationshipResolver,
}

impl Database {
    /// Create an empty in-memory database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a redb-backed database at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, CasegraphError> {
        Ok(Self::with_backend(StorageBackend::Persistent(
            RedbStore::open(path)?,
        )))
    }

    /// Wrap an existing backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Replace the NGSI namespace used by synthesis and linking.
    #[must_use]
    pub fn with_namespace(mut self, namespace: NgsiNamespace) -> Self {
        self.synthesizer = EntitySynthesizer::new(namespace.clone());
        self.resolver = RelationshipResolver::new(namespace);
        self
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn namespace(&self) -> &NgsiNamespace {
        self.synthesizer.namespace()
    }

    /// Direct access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &StorageBackend {
        &self.backend
    }

    /// Create the managed collections that are missing.
    pub fn provision(&mut self) -> Result<ProvisionReport, CasegraphError> {
        provision(&mut self.backend)
    }

    /// Every collection with its kind and size.
    pub fn collections(&self) -> Result<Vec<CollectionInfo>, CasegraphError> {
        self.backend.collections()
    }

    // -------------------------------------------------------------------------
    // Entries
    // -------------------------------------------------------------------------

    /// Store one document in the entry collection.
    pub fn insert_entry(&mut self, document: Document) -> Result<Document, CasegraphError> {
        self.backend.insert(ENTRY_COLLECTION, document)
    }

    pub fn entries(&self) -> Result<Vec<Document>, CasegraphError> {
        self.backend.scan(ENTRY_COLLECTION)
    }

    pub fn entry_keys(&self) -> Result<Vec<Value>, CasegraphError> {
        attributes::keys(&self.backend, ENTRY_COLLECTION)
    }

    pub fn entry_types(&self) -> Result<Vec<Value>, CasegraphError> {
        attributes::types(&self.backend, ENTRY_COLLECTION)
    }

    /// Per entry, the attributes whose name contains `fragment`.
    pub fn entry_attributes(&self, fragment: &str) -> Result<Vec<Vec<NamedValue>>, CasegraphError> {
        attributes::filtered(
            &self.backend,
            ENTRY_COLLECTION,
            &NamePattern::contains(fragment),
        )
    }

    pub fn entry_attribute_maps(&self) -> Result<Vec<Document>, CasegraphError> {
        attributes::zipped(&self.backend, ENTRY_COLLECTION)
    }

    pub fn entry_relationships(&self) -> Result<Vec<RelationshipRef>, CasegraphError> {
        attributes::relationships(&self.backend, ENTRY_COLLECTION)
    }

    pub fn nested_entry_relationships(&self) -> Result<Vec<RelationshipRef>, CasegraphError> {
        attributes::nested_relationships(&self.backend, ENTRY_COLLECTION)
    }

    /// Link entries whose relationship `object` is another entry's `_key`.
    pub fn link_entries_by_key(&mut self) -> Result<LinkReport<KeyEdgeRow>, CasegraphError> {
        self.resolver
            .link_by_key(&mut self.backend, ENTRY_COLLECTION, ENTRY_EDGE_COLLECTION)
    }

    /// Link entries whose relationship `object` is another entry's `id`.
    pub fn link_entries_by_id(&mut self) -> Result<LinkReport<IdEdgeRow>, CasegraphError> {
        self.resolver
            .link_by_id(&mut self.backend, ENTRY_COLLECTION, ENTRY_EDGE_COLLECTION)
    }

    // -------------------------------------------------------------------------
    // Cases
    // -------------------------------------------------------------------------

    /// Load CSV rows into the source collection.
    pub fn ingest_csv<R: Read>(&mut self, input: R) -> Result<TabularReport, CasegraphError> {
        tabular::ingest(&mut self.backend, SOURCE_COLLECTION, input)
    }

    /// Load a CSV file into the source collection.
    pub fn ingest_csv_path(&mut self, path: &Path) -> Result<TabularReport, CasegraphError> {
        tabular::ingest_path(&mut self.backend, SOURCE_COLLECTION, path)
    }

    /// Synthesize case entities from every source record.
    pub fn synthesize_cases(&mut self) -> Result<SynthesisReport, CasegraphError> {
        self.synthesizer
            .run(&mut self.backend, SOURCE_COLLECTION, ENTITY_COLLECTION)
    }

    /// Link case entities through their relationship properties.
    pub fn link_cases(&mut self) -> Result<LinkReport<CaseEdgeRow>, CasegraphError> {
        self.resolver
            .link_cases(&mut self.backend, ENTITY_COLLECTION, ENTITY_EDGE_COLLECTION)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn entries_round_trip() {
        let mut db = Database::new();
        db.provision().expect("provision");

        let stored = db.insert_entry(doc(json!({"type": "Thing"}))).expect("insert");
        assert_eq!(stored["_id"], json!("entries/1"));
        assert_eq!(db.entry_keys().expect("keys"), vec![json!("1")]);
        assert_eq!(db.entry_types().expect("types"), vec![json!("Thing")]);
        assert_eq!(db.entries().expect("entries").len(), 1);
    }

    #[test]
    fn operations_fail_before_provisioning() {
        let db = Database::new();
        let err = db.entry_keys().expect_err("not provisioned");
        assert_eq!(err.to_string(), "collection or view not found: entries");
    }

    #[test]
    fn csv_to_edges_pipeline() {
        let mut db = Database::new();
        db.provision().expect("provision");
        let csv = "patient_id,sex,by_patient\n4,M,\n7,F,4\n";

        db.ingest_csv(csv.as_bytes()).expect("ingest");
        let synthesized = db.synthesize_cases().expect("synthesize");
        assert_eq!(synthesized.inserted, 2);

        let linked = db.link_cases().expect("link");
        assert_eq!(linked.inserted, 1);
        assert_eq!(linked.rows[0].from, json!("urn:covid-10:case:007"));
        assert_eq!(linked.rows[0].to, "urn:covid-10:case:004");
        assert_eq!(linked.rows[0].to_key, "patientJSON/1");
    }

    #[test]
    fn redb_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("casegraph.redb");

        {
            let mut db = Database::with_redb(&path).expect("open");
            assert!(db.is_persistent());
            db.provision().expect("provision");
            db.insert_entry(doc(json!({"name": "kept"}))).expect("insert");
        }

        let mut db = Database::with_redb(&path).expect("reopen");
        let report = db.provision().expect("provision");
        assert_eq!(report.existing.len(), 4);
        assert_eq!(db.entry_keys().expect("keys"), vec![json!("1")]);
    }

    #[test]
    fn namespace_override_reaches_jobs() {
        let namespace = NgsiNamespace {
            case_id_prefix: "urn:x:".to_string(),
            ..NgsiNamespace::default()
        };
        let mut db = Database::new().with_namespace(namespace);
        db.provision().expect("provision");
        db.ingest_csv("patient_id,by_patient\n1,\n2,1\n".as_bytes()).expect("ingest");
        db.synthesize_cases().expect("synthesize");

        let linked = db.link_cases().expect("link");
        assert_eq!(linked.rows[0].to, "urn:x:1");
        assert_eq!(db.namespace().case_id_prefix, "urn:x:");
    }
}
