//! # Attribute Listing
//!
//! Read-only projections over the documents of a collection.

use crate::pattern::{NamePattern, matching_fields};
use crate::primitives::NESTED_RELATIONSHIP_PATTERN;
use crate::resolver::relationship_name_pattern;
use crate::store::DocumentStore;
use crate::types::{CasegraphError, Document, KEY_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

/// A relationship attribute and the `object` it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub relationship: String,
    /// The attribute's `object`, `null` when it has none.
    pub key: Value,
}

impl RelationshipRef {
    fn from_attribute(name: &str, value: &Value) -> Self {
        Self {
            relationship: name.to_string(),
            key: value.get("object").cloned().unwrap_or(Value::Null),
        }
    }
}

/// `_key` of every document.
pub fn keys<S: DocumentStore>(store: &S, collection: &str) -> Result<Vec<Value>, CasegraphError> {
    Ok(store
        .scan(collection)?
        .iter()
        .map(|doc| doc.get(KEY_FIELD).cloned().unwrap_or(Value::Null))
        .collect())
}

/// `type` of every document, `null` when absent.
pub fn types<S: DocumentStore>(store: &S, collection: &str) -> Result<Vec<Value>, CasegraphError> {
    Ok(store
        .scan(collection)?
        .iter()
        .map(|doc| doc.get("type").cloned().unwrap_or(Value::Null))
        .collect())
}

/// Per document, the attributes whose name matches `pattern`.
pub fn filtered<S: DocumentStore>(
    store: &S,
    collection: &str,
    pattern: &NamePattern,
) -> Result<Vec<Vec<NamedValue>>, CasegraphError> {
    Ok(store
        .scan(collection)?
        .iter()
        .map(|doc| {
            matching_fields(doc, pattern)
                .map(|(name, value)| NamedValue {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect()
        })
        .collect())
}

/// Per document, a `{name: value}` mapping of all its attributes,
/// system fields included.
pub fn zipped<S: DocumentStore>(
    store: &S,
    collection: &str,
) -> Result<Vec<Document>, CasegraphError> {
    store.scan(collection)
}

/// Attributes named like relationships (`is` or `By`), flattened across
/// all documents.
pub fn relationships<S: DocumentStore>(
    store: &S,
    collection: &str,
) -> Result<Vec<RelationshipRef>, CasegraphError> {
    let pattern = relationship_name_pattern();
    let mut refs = Vec::new();
    for doc in store.scan(collection)? {
        refs.extend(
            matching_fields(&doc, &pattern)
                .map(|(name, value)| RelationshipRef::from_attribute(name, value)),
        );
    }
    Ok(refs)
}

/// Second-level listing: inside each relationship attribute that is an
/// object, the nested attributes whose name contains `By`.
pub fn nested_relationships<S: DocumentStore>(
    store: &S,
    collection: &str,
) -> Result<Vec<RelationshipRef>, CasegraphError> {
    let outer = relationship_name_pattern();
    let inner = NamePattern::contains(NESTED_RELATIONSHIP_PATTERN);
    let mut refs = Vec::new();
    for doc in store.scan(collection)? {
        for (_, value) in matching_fields(&doc, &outer) {
            let Value::Object(attributes) = value else {
                continue;
            };
            refs.extend(
                matching_fields(attributes, &inner)
                    .map(|(name, value)| RelationshipRef::from_attribute(name, value)),
            );
        }
    }
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::CollectionKind;
    use serde_json::json;

    fn store_with(docs: Vec<Value>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_collection("entries", CollectionKind::Document).expect("create");
        for value in docs {
            if let Value::Object(map) = value {
                store.insert("entries", map).expect("insert");
            }
        }
        store
    }

    #[test]
    fn keys_and_types() {
        let store = store_with(vec![json!({"type": "A"}), json!({"name": "x"})]);
        assert_eq!(keys(&store, "entries").expect("keys"), vec![json!("1"), json!("2")]);
        assert_eq!(types(&store, "entries").expect("types"), vec![json!("A"), Value::Null]);
    }

    #[test]
    fn filtered_keeps_matching_names_per_document() {
        let store = store_with(vec![json!({"name": "x", "age": 3, "city": "y"})]);
        let rows = filtered(&store, "entries", &NamePattern::contains("e")).expect("filtered");

        assert_eq!(rows.len(), 1);
        let names: Vec<_> = rows[0].iter().map(|nv| nv.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "_key"]);
        assert_eq!(rows[0][1].value, json!(3));
    }

    #[test]
    fn zipped_includes_system_fields() {
        let store = store_with(vec![json!({"name": "x"})]);
        let rows = zipped(&store, "entries").expect("zipped");
        assert_eq!(rows[0].get("name"), Some(&json!("x")));
        assert_eq!(rows[0].get("_id"), Some(&json!("entries/1")));
    }

    #[test]
    fn relationships_report_object_or_null() {
        let store = store_with(vec![json!({
            "isPartOf": {"type": "Relationship", "object": "urn:a"},
            "ownedBy": "plain",
            "name": "n"
        })]);
        let refs = relationships(&store, "entries").expect("refs");

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].relationship, "isPartOf");
        assert_eq!(refs[0].key, json!("urn:a"));
        assert_eq!(refs[1].relationship, "ownedBy");
        assert_eq!(refs[1].key, Value::Null);
    }

    #[test]
    fn nested_relationships_look_one_level_down() {
        let store = store_with(vec![json!({
            "isPartOf": {
                "type": "Relationship",
                "object": "urn:a",
                "createdBy": {"type": "Relationship", "object": "urn:b"},
                "name": "ignored"
            },
            "ownedBy": 4
        })]);
        let refs = nested_relationships(&store, "entries").expect("refs");

        assert_eq!(
            refs,
            vec![RelationshipRef {
                relationship: "createdBy".to_string(),
                key: json!("urn:b"),
            }]
        );
    }

    #[test]
    fn missing_collection_is_an_error() {
        let store = MemoryStore::new();
        assert!(keys(&store, "entries").is_err());
    }
}
