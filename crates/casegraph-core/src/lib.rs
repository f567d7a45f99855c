//! # casegraph-core
//!
//! The graph materializer for casegraph.
//!
//! This crate turns flat case records into NGSI-LD entities and then into
//! explicit edges between them:
//! - `pattern`: locate record fields by a fragment of their name
//! - `synthesizer`: build `InfectionCase` entities from extracted fields
//! - `resolver`: resolve relationship attributes into edge documents
//! - `attributes`: read-only projections over a collection
//!
//! Everything runs against the [`DocumentStore`] trait, implemented by an
//! in-memory store and a redb-backed one.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - `BTreeMap` for every index, so runs are reproducible
//! - Jobs report what they did instead of logging it
//! - No floats: coordinates and counters are integers

// =============================================================================
// MODULES
// =============================================================================

pub mod attributes;
pub mod database;
pub mod ngsi;
pub mod pattern;
pub mod primitives;
pub mod provision;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod synthesizer;
pub mod tabular;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    CasegraphError, CollectionInfo, CollectionKind, Document, DocumentHandle, FROM_FIELD,
    ID_FIELD, KEY_FIELD, TO_FIELD,
};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use database::{Database, StorageBackend};
pub use storage::RedbStore;
pub use store::{DocumentStore, MemoryStore};

// =============================================================================
// RE-EXPORTS: Materializer
// =============================================================================

pub use attributes::{NamedValue, RelationshipRef};
pub use ngsi::{EntityDocument, Geometry, PostalAddress, Property, TravelRoute};
pub use pattern::{Extracted, NamePattern, extract};
pub use provision::{MANAGED_COLLECTIONS, ProvisionReport, provision};
pub use resolver::{
    CaseEdgeRow, EdgeOutcome, IdEdgeRow, KeyEdgeRow, LinkReport, RelationshipResolver,
};
pub use synthesizer::{
    CaseFields, CaseRow, EntitySynthesizer, NgsiNamespace, SkippedRecord, SynthesisReport,
};
pub use tabular::TabularReport;
