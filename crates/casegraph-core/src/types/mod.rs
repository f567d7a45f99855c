//! # Core Type Definitions
//!
//! This module contains the shared types for the casegraph document model:
//! - Documents and their system fields (`Document`, `DocumentHandle`)
//! - Collection descriptors (`CollectionKind`, `CollectionInfo`)
//! - Error types (`CasegraphError`)
//!
//! ## Ordering Guarantees
//!
//! `Document` is a `serde_json::Map` built with `preserve_order`, so a
//! document keeps the field order it was created or parsed with. Field
//! pattern matching relies on this order.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A schemaless JSON object stored in a collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// System field holding the document key, unique within its collection.
pub const KEY_FIELD: &str = "_key";

/// System field holding the database-wide handle `<collection>/<key>`.
pub const ID_FIELD: &str = "_id";

/// Edge field naming the source document handle.
pub const FROM_FIELD: &str = "_from";

/// Edge field naming the target document handle.
pub const TO_FIELD: &str = "_to";

/// A parsed `<collection>/<key>` document handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Collection the document lives in.
    pub collection: String,
    /// Key of the document inside the collection.
    pub key: String,
}

impl DocumentHandle {
    /// Create a handle from its parts.
    #[must_use]
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Parse a `<collection>/<key>` string.
    ///
    /// Returns `None` if either part is empty or the separator is missing.
    #[must_use]
    pub fn parse(handle: &str) -> Option<Self> {
        let (collection, key) = handle.split_once('/')?;
        if collection.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(collection, key))
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// Check that a user-supplied document key is storable.
///
/// Keys must be non-empty, at most `MAX_KEY_LENGTH` bytes and free of `/`
/// (which separates collection and key in a handle).
pub fn validate_key(key: &str) -> Result<(), CasegraphError> {
    if key.is_empty() || key.len() > crate::primitives::MAX_KEY_LENGTH || key.contains('/') {
        return Err(CasegraphError::InvalidDocument(format!(
            "illegal document key '{}'",
            key
        )));
    }
    Ok(())
}

// =============================================================================
// COLLECTIONS
// =============================================================================

/// Whether a collection stores plain documents or edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Plain JSON documents.
    Document,
    /// Documents that must carry `_from` and `_to` handles.
    Edge,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Edge => write!(f, "edge"),
        }
    }
}

/// Descriptor of a collection as reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Document or edge collection.
    pub kind: CollectionKind,
    /// Number of stored documents.
    pub count: usize,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in casegraph.
///
/// Store operations and batch jobs return `Result<T, CasegraphError>`.
/// The HTTP layer renders these with `to_string()`.
#[derive(Debug, Error)]
pub enum CasegraphError {
    /// The named collection does not exist.
    #[error("collection or view not found: {0}")]
    CollectionNotFound(String),

    /// A collection exists but has the wrong kind for the operation.
    #[error("collection '{name}' has kind {actual}, expected {expected}")]
    CollectionKindMismatch {
        name: String,
        expected: CollectionKind,
        actual: CollectionKind,
    },

    /// A document with the same key already exists.
    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolated(String),

    /// The document cannot be stored as given.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// An edge document lacks a valid `_from` or `_to` handle.
    #[error("invalid edge attribute: {0}")]
    InvalidEdge(String),

    /// Settings that cannot work together.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tabular input could not be parsed.
    #[error("tabular input error: {0}")]
    TabularError(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
