//! # API Request/Response Types
//!
//! JSON structures of the HTTP API that are not plain core reports.

use casegraph_core::{CasegraphError, primitives::DEFAULT_ATTRIBUTE_PATTERN};
use serde::{Deserialize, Serialize};

/// Maximum length of a user-supplied attribute-name fragment.
pub const MAX_PATTERN_LENGTH: usize = 256;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ATTRIBUTE QUERY
// =============================================================================

/// Query string of the filtered attribute listing (`GET /typese?pattern=...`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeQuery {
    /// Name fragment to match; `e` when omitted.
    pub pattern: Option<String>,
}

impl AttributeQuery {
    /// The fragment to match, validated.
    pub fn fragment(&self) -> Result<&str, CasegraphError> {
        let fragment = self.pattern.as_deref().unwrap_or(DEFAULT_ATTRIBUTE_PATTERN);
        if fragment.len() > MAX_PATTERN_LENGTH {
            return Err(CasegraphError::InvalidDocument(format!(
                "pattern length {} exceeds maximum {} bytes",
                fragment.len(),
                MAX_PATTERN_LENGTH
            )));
        }
        Ok(fragment)
    }
}
