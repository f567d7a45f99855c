//! # NGSI-LD Entity Model
//!
//! Typed representation of the entities the synthesizer writes.
//!
//! Every attribute of an entity other than `id` and `type` is a tagged
//! wrapper serialized with its `type` discriminator:
//!
//! ```text
//! { "type": "Property",     "value": ... }
//! { "type": "GeoProperty",  "value": { "type": "Point", "coordinates": [x, y] } }
//! { "type": "Relationship", "object": "<target id>", ...extra }
//! ```

use crate::types::{CasegraphError, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// PROPERTY WRAPPERS
// =============================================================================

/// A GeoJSON geometry carried by a `GeoProperty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Geometry type, `Point` for everything casegraph emits.
    #[serde(rename = "type")]
    pub kind: String,
    /// Integer coordinates; placeholders are always `[0, 0]`.
    pub coordinates: [i64; 2],
}

impl Geometry {
    /// A point geometry.
    #[must_use]
    pub fn point(x: i64, y: i64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [x, y],
        }
    }
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Property {
    /// Plain value.
    Property { value: Value },
    /// Geographic value.
    GeoProperty { value: Geometry },
    /// Link to another entity by id, with optional nested attributes.
    Relationship {
        object: String,
        #[serde(flatten)]
        extra: BTreeMap<String, Value>,
    },
}

impl Property {
    /// Wrap a plain value.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Property {
            value: value.into(),
        }
    }

    /// Wrap any serializable value.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, CasegraphError> {
        let value = serde_json::to_value(value)
            .map_err(|e| CasegraphError::SerializationError(e.to_string()))?;
        Ok(Self::Property { value })
    }

    /// Wrap a geometry.
    #[must_use]
    pub fn geo(value: Geometry) -> Self {
        Self::GeoProperty { value }
    }

    /// A relationship without nested attributes.
    #[must_use]
    pub fn relationship(object: impl Into<String>) -> Self {
        Self::Relationship {
            object: object.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach a nested attribute to a relationship. No-op for other kinds.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        if let Self::Relationship { extra, .. } = &mut self {
            extra.insert(name.into(), value);
        }
        self
    }
}

// =============================================================================
// ADDRESS & TRAVEL ROUTES
// =============================================================================

/// Postal address value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub address_country: String,
    pub address_region: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
}

/// One stop of a case's travel history.
///
/// Case records carry no travel data, so synthesized entities hold blank
/// templates of this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelRoute {
    pub place_name: String,
    pub address: Property,
    pub location: Property,
    pub transport: String,
    pub begin_time: String,
    pub duration: u64,
}

impl TravelRoute {
    /// An empty route template located at `[0, 0]` in `country`.
    pub fn placeholder(country: &str) -> Result<Self, CasegraphError> {
        let address = PostalAddress {
            address_country: country.to_string(),
            address_region: Value::String(String::new()),
            address_locality: Some(String::new()),
            street_address: Some(String::new()),
        };
        Ok(Self {
            place_name: String::new(),
            address: Property::from_serializable(&address)?,
            location: Property::geo(Geometry::point(0, 0)),
            transport: String::new(),
            begin_time: String::new(),
            duration: 0,
        })
    }
}

// =============================================================================
// ENTITY DOCUMENT
// =============================================================================

/// A synthesized NGSI-LD entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Property>,
}

impl EntityDocument {
    /// Create an entity with no properties.
    #[must_use]
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add or replace a property.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Convert to a storable document.
    pub fn to_document(&self) -> Result<Document, CasegraphError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CasegraphError::SerializationError(format!(
                "entity serialized to non-object {}",
                other
            ))),
            Err(e) => Err(CasegraphError::SerializationError(e.to_string())),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
