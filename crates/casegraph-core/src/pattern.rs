//! # Field Pattern Extraction
//!
//! Locates record fields by a fragment of their name instead of a fixed
//! schema position.
//!
//! Matching is case-sensitive substring containment. When several fields
//! match, the first one in the record's field order wins; records keep the
//! column order they were ingested with, so the result is reproducible.

use crate::types::Document;
use serde_json::Value;

// =============================================================================
// NAME PATTERN
// =============================================================================

/// A predicate over attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    /// Name contains the fragment.
    Contains(String),
    /// Name contains at least one of the fragments.
    AnyOf(Vec<String>),
}

impl NamePattern {
    /// Pattern matching names that contain `fragment`.
    #[must_use]
    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    /// Pattern matching names that contain any of `fragments`.
    #[must_use]
    pub fn any_of<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(fragments.into_iter().map(Into::into).collect())
    }

    /// Check an attribute name against the pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(fragment) => name.contains(fragment.as_str()),
            Self::AnyOf(fragments) => fragments.iter().any(|f| name.contains(f.as_str())),
        }
    }
}

// =============================================================================
// EXTRACTION RESULT
// =============================================================================

/// Outcome of looking up one field by pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// A field matched.
    Found {
        /// Name of the matching field.
        field: String,
        /// Its raw value.
        value: Value,
    },
    /// No field name matched the pattern.
    Absent,
}

impl Extracted {
    /// The matched value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Found { value, .. } => Some(value),
            Self::Absent => None,
        }
    }

    /// The name of the matched field, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Found { field, .. } => Some(field),
            Self::Absent => None,
        }
    }

    /// `true` when no field matched.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The matched value, or JSON `null` when absent.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.value().cloned().unwrap_or(Value::Null)
    }

    /// The matched value rendered for string concatenation.
    ///
    /// Strings are used verbatim, numbers and booleans in their JSON form,
    /// `null` as the empty string. Absent fields and nested values yield `None`.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self.value()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Return the first field of `record` whose name satisfies `pattern`.
#[must_use]
pub fn extract(record: &Document, pattern: &NamePattern) -> Extracted {
    record
        .iter()
        .find(|(name, _)| pattern.matches(name))
        .map(|(name, value)| Extracted::Found {
            field: name.clone(),
            value: value.clone(),
        })
        .unwrap_or(Extracted::Absent)
}

/// All `(name, value)` pairs of `record` whose name satisfies `pattern`,
/// in field order.
pub fn matching_fields<'a>(
    record: &'a Document,
    pattern: &'a NamePattern,
) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
    record.iter().filter(move |(name, _)| pattern.matches(name))
}

// =============================================================================
// TESTS
// =============================================================================
