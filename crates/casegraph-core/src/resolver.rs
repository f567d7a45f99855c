//! # Relationship Resolver
//!
//! Materializes edges between stored documents.
//!
//! Every job runs in two passes: pass 1 builds a `BTreeMap` index of the
//! target documents, pass 2 walks the relationship attributes of each
//! source document and resolves their `object` against the index. All
//! edges of a run are written with one atomic `insert_batch`, so edges are
//! only ever created for documents that already exist.
//!
//! Running a job twice without clearing the edge collection stores every
//! edge twice.

use crate::pattern::NamePattern;
use crate::primitives::{RELATIONSHIP_NAME_PATTERNS, RELATIONSHIP_TYPE};
use crate::store::DocumentStore;
use crate::synthesizer::{NgsiNamespace, ensure_kind};
use crate::types::{
    CasegraphError, CollectionKind, Document, DocumentHandle, FROM_FIELD, ID_FIELD, KEY_FIELD,
    TO_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Payload copied from a case's spreader relationship onto its edge.
const SPREADER_INFO_FIELD: &str = "spreaderInfo";

// =============================================================================
// OUTCOMES
// =============================================================================

/// What happened to one relationship attribute during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EdgeOutcome {
    /// An edge was emitted.
    Linked {
        from: String,
        relationship: String,
        to: String,
    },
    /// The target does not exist; no edge.
    Unresolved {
        from: String,
        relationship: String,
        object: String,
    },
    /// The target id has an empty suffix; no edge.
    BlankTarget { from: String, relationship: String },
    /// The attribute carries no string `object`; no edge.
    MissingObject { from: String, relationship: String },
}

impl EdgeOutcome {
    #[must_use]
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }
}

/// Result of one edge materialization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReport<R> {
    /// One row per emitted edge, in emission order.
    pub rows: Vec<R>,
    /// One outcome per inspected relationship attribute.
    pub outcomes: Vec<EdgeOutcome>,
    /// Edges written to the edge collection.
    pub inserted: usize,
}

impl<R> Default for LinkReport<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            outcomes: Vec::new(),
            inserted: 0,
        }
    }
}

impl<R> LinkReport<R> {
    /// Number of attributes that produced an edge.
    #[must_use]
    pub fn linked(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_linked()).count()
    }

    /// Number of attributes that produced no edge.
    #[must_use]
    pub fn unlinked(&self) -> usize {
        self.outcomes.len().saturating_sub(self.linked())
    }
}

// =============================================================================
// RESPONSE ROWS
// =============================================================================

/// Row reported for a case-to-case edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseEdgeRow {
    /// `id` of the source case.
    pub from: Value,
    /// Name of the relationship property.
    pub rel: String,
    /// The relationship's `object`.
    pub to: String,
    /// `_id` of the target case.
    #[serde(rename = "toKey")]
    pub to_key: String,
    /// The copied `spreaderInfo` payload.
    pub value: Value,
}

/// Row reported for an edge resolved by entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdEdgeRow {
    #[serde(rename = "fromId")]
    pub from_id: String,
    pub relationship: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    #[serde(rename = "toKey")]
    pub to_key: String,
}

/// Row reported for an edge resolved by document key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEdgeRow {
    /// `_id` of the source document.
    pub id: String,
    pub relationship: String,
    /// The relationship's `object`, used as the target key.
    pub key: String,
    /// The target handle.
    pub test: String,
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Edge materialization jobs.
#[derive(Debug, Clone, Default)]
pub struct RelationshipResolver {
    namespace: NgsiNamespace,
}

impl RelationshipResolver {
    #[must_use]
    pub fn new(namespace: NgsiNamespace) -> Self {
        Self { namespace }
    }

    /// Link case entities through their `Relationship`-typed properties.
    ///
    /// A property is linked when its `object` equals the `id` of a document
    /// in `entities`. Blank targets (the id prefix alone) are skipped. The
    /// property's `spreaderInfo` is copied onto the edge.
    pub fn link_cases<S: DocumentStore>(
        &self,
        store: &mut S,
        entities: &str,
        edges: &str,
    ) -> Result<LinkReport<CaseEdgeRow>, CasegraphError> {
        ensure_kind(store, entities, CollectionKind::Document)?;
        ensure_kind(store, edges, CollectionKind::Edge)?;

        let documents = store.scan(entities)?;
        let index = index_by_entity_id(&documents);

        let mut report = LinkReport::default();
        let mut batch = Vec::new();
        for doc in &documents {
            let from = system_id(doc);
            for (name, property) in doc {
                if !is_relationship_property(property) {
                    continue;
                }
                let Some(object) = relationship_object(property) else {
                    report.outcomes.push(EdgeOutcome::MissingObject {
                        from: from.clone(),
                        relationship: name.clone(),
                    });
                    continue;
                };
                if self.namespace.is_blank_case_id(object) {
                    report.outcomes.push(EdgeOutcome::BlankTarget {
                        from: from.clone(),
                        relationship: name.clone(),
                    });
                    continue;
                }
                let Some(targets) = index.get(object) else {
                    report.outcomes.push(unresolved(&from, name, object));
                    continue;
                };

                let spreader_info = property
                    .get(SPREADER_INFO_FIELD)
                    .cloned()
                    .unwrap_or(Value::Null);
                for to in targets {
                    let mut edge = edge_document(&from, to, name);
                    edge.insert(SPREADER_INFO_FIELD.to_string(), spreader_info.clone());
                    batch.push(edge);

                    report.rows.push(CaseEdgeRow {
                        from: doc.get("id").cloned().unwrap_or(Value::Null),
                        rel: name.clone(),
                        to: object.to_string(),
                        to_key: to.clone(),
                        value: spreader_info.clone(),
                    });
                    report.outcomes.push(linked(&from, name, to));
                }
            }
        }

        report.inserted = store.insert_batch(edges, batch)?.len();
        Ok(report)
    }

    /// Link documents of `collection` by entity id.
    ///
    /// Relationship attributes are found by name (`is` or `By`); each one's
    /// `object` is matched against the `id` field of the documents in the
    /// same collection.
    pub fn link_by_id<S: DocumentStore>(
        &self,
        store: &mut S,
        collection: &str,
        edges: &str,
    ) -> Result<LinkReport<IdEdgeRow>, CasegraphError> {
        ensure_kind(store, collection, CollectionKind::Document)?;
        ensure_kind(store, edges, CollectionKind::Edge)?;

        let documents = store.scan(collection)?;
        let index = index_by_entity_id(&documents);
        let pattern = relationship_name_pattern();

        let mut report = LinkReport::default();
        let mut batch = Vec::new();
        for doc in &documents {
            let from = system_id(doc);
            for (name, object) in named_relationships(doc, &pattern) {
                let Some(object) = object else {
                    report.outcomes.push(EdgeOutcome::MissingObject {
                        from: from.clone(),
                        relationship: name.clone(),
                    });
                    continue;
                };
                let Some(targets) = index.get(object) else {
                    report.outcomes.push(unresolved(&from, name, object));
                    continue;
                };

                for to in targets {
                    batch.push(edge_document(&from, to, name));
                    report.rows.push(IdEdgeRow {
                        from_id: from.clone(),
                        relationship: name.clone(),
                        to_id: object.to_string(),
                        to_key: to.clone(),
                    });
                    report.outcomes.push(linked(&from, name, to));
                }
            }
        }

        report.inserted = store.insert_batch(edges, batch)?.len();
        Ok(report)
    }

    /// Link documents of `collection` by document key.
    ///
    /// Like [`link_by_id`](Self::link_by_id), but `object` is taken as the
    /// `_key` of a document in `collection`. The edge is emitted only
    /// if that document exists.
    pub fn link_by_key<S: DocumentStore>(
        &self,
        store: &mut S,
        collection: &str,
        edges: &str,
    ) -> Result<LinkReport<KeyEdgeRow>, CasegraphError> {
        ensure_kind(store, collection, CollectionKind::Document)?;
        ensure_kind(store, edges, CollectionKind::Edge)?;

        let documents = store.scan(collection)?;
        let index: BTreeMap<&str, String> = documents
            .iter()
            .filter_map(|doc| {
                let key = doc.get(KEY_FIELD)?.as_str()?;
                Some((key, system_id(doc)))
            })
            .collect();
        let pattern = relationship_name_pattern();

        let mut report = LinkReport::default();
        let mut batch = Vec::new();
        for doc in &documents {
            let from = system_id(doc);
            for (name, object) in named_relationships(doc, &pattern) {
                let Some(object) = object else {
                    report.outcomes.push(EdgeOutcome::MissingObject {
                        from: from.clone(),
                        relationship: name.clone(),
                    });
                    continue;
                };
                let Some(to) = index.get(object) else {
                    report.outcomes.push(unresolved(&from, name, object));
                    continue;
                };

                batch.push(edge_document(&from, to, name));
                report.rows.push(KeyEdgeRow {
                    id: from.clone(),
                    relationship: name.clone(),
                    key: object.to_string(),
                    test: DocumentHandle::new(collection, object).to_string(),
                });
                report.outcomes.push(linked(&from, name, to));
            }
        }

        report.inserted = store.insert_batch(edges, batch)?.len();
        Ok(report)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Pattern selecting relationship attributes by name.
#[must_use]
pub fn relationship_name_pattern() -> NamePattern {
    NamePattern::any_of(RELATIONSHIP_NAME_PATTERNS)
}

/// Pass 1: entity `id` -> `_id` of every document carrying it, in scan order.
///
/// Duplicate ids keep all their documents, so a relationship to such an id
/// yields one edge per target.
fn index_by_entity_id(documents: &[Document]) -> BTreeMap<&str, Vec<String>> {
    let mut index: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for doc in documents {
        if let Some(id) = doc.get("id").and_then(Value::as_str) {
            index.entry(id).or_default().push(system_id(doc));
        }
    }
    index
}

/// Attributes whose name matches `pattern`, with their string `object`.
fn named_relationships<'a>(
    doc: &'a Document,
    pattern: &'a NamePattern,
) -> impl Iterator<Item = (&'a String, Option<&'a str>)> + 'a {
    crate::pattern::matching_fields(doc, pattern)
        .map(|(name, value)| (name, relationship_object(value)))
}

fn is_relationship_property(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some(RELATIONSHIP_TYPE)
}

fn relationship_object(value: &Value) -> Option<&str> {
    value.get("object").and_then(Value::as_str)
}

fn system_id(doc: &Document) -> String {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn edge_document(from: &str, to: &str, relationship: &str) -> Document {
    let mut edge = Document::new();
    edge.insert(FROM_FIELD.to_string(), Value::String(from.to_string()));
    edge.insert(TO_FIELD.to_string(), Value::String(to.to_string()));
    edge.insert(
        "relationship".to_string(),
        Value::String(relationship.to_string()),
    );
    edge
}

fn linked(from: &str, relationship: &str, to: &str) -> EdgeOutcome {
    EdgeOutcome::Linked {
        from: from.to_string(),
        relationship: relationship.to_string(),
        to: to.to_string(),
    }
}

fn unresolved(from: &str, relationship: &str, object: &str) -> EdgeOutcome {
    EdgeOutcome::Unresolved {
        from: from.to_string(),
        relationship: relationship.to_string(),
        object: object.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
