//! # API Endpoint Handlers
//!
//! One handler per route, each running exactly one database operation.
//!
//! Operation errors are not mapped to HTTP statuses: the error message is
//! sent as a plain-text body with `200 OK`.

use super::{
    AppState,
    types::{AttributeQuery, HealthResponse},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use casegraph_core::{CasegraphError, Document};
use serde::Serialize;

/// Render an operation result: JSON on success, the error text otherwise.
fn respond<T: Serialize>(route: &'static str, result: Result<T, CasegraphError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::warn!(route, error = %e, "operation failed");
            e.to_string().into_response()
        }
    }
}

// =============================================================================
// GREETINGS & HEALTH
// =============================================================================

pub async fn hello_world_handler() -> &'static str {
    "Hello World"
}

pub async fn hello_handler(Path(name): Path<String>) -> String {
    format!("Hello {}", name)
}

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// ENTRIES
// =============================================================================

/// Store a JSON object in the entry collection.
pub async fn create_entry_handler(
    State(state): State<AppState>,
    Json(document): Json<Document>,
) -> Response {
    let mut db = state.database.write().await;
    respond("POST /entries", db.insert_entry(document))
}

/// `_key` of every entry.
pub async fn entry_keys_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond("GET /entries", db.entry_keys())
}

/// Every entry document.
pub async fn entries_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond("GET /foxx", db.entries())
}

// =============================================================================
// ATTRIBUTE LISTINGS
// =============================================================================

pub async fn entry_types_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond("GET /type", db.entry_types())
}

/// `{name, value}` pairs of entry attributes whose name contains the pattern.
pub async fn entry_attributes_handler(
    State(state): State<AppState>,
    Query(query): Query<AttributeQuery>,
) -> Response {
    let db = state.database.read().await;
    let result = query
        .fragment()
        .and_then(|fragment| db.entry_attributes(fragment));
    respond("GET /typese", result)
}

pub async fn entry_attribute_maps_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond("GET /get-ngsi-att", db.entry_attribute_maps())
}

pub async fn entry_relationships_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond("GET /get-ngsi-relationship", db.entry_relationships())
}

pub async fn nested_entry_relationships_handler(State(state): State<AppState>) -> Response {
    let db = state.database.read().await;
    respond(
        "GET /get-second-ngsi-relationship",
        db.nested_entry_relationships(),
    )
}

// =============================================================================
// EDGE JOBS
// =============================================================================

/// Link entries whose relationship object is another entry's `_key`.
pub async fn link_entries_by_key_handler(State(state): State<AppState>) -> Response {
    let mut db = state.database.write().await;
    let result = db.link_entries_by_key().map(|report| {
        tracing::info!(
            linked = report.linked(),
            unlinked = report.unlinked(),
            "entry edges by key"
        );
        report.rows
    });
    respond("GET /add-ngsi-edge-key", result)
}

/// Link entries whose relationship object is another entry's `id`.
pub async fn link_entries_by_id_handler(State(state): State<AppState>) -> Response {
    let mut db = state.database.write().await;
    let result = db.link_entries_by_id().map(|report| {
        tracing::info!(
            linked = report.linked(),
            unlinked = report.unlinked(),
            "entry edges by id"
        );
        report.rows
    });
    respond("GET /add-ngsi-edge-id", result)
}

/// Synthesize case entities from the tabular source collection.
pub async fn csv_to_ngsi_handler(State(state): State<AppState>) -> Response {
    let mut db = state.database.write().await;
    let result = db.synthesize_cases().map(|report| {
        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "case entities synthesized"
        );
        if !report.duplicate_ids.is_empty() {
            tracing::warn!(ids = ?report.duplicate_ids, "duplicate case ids");
        }
        report.rows
    });
    respond("GET /csv-to-ngsi", result)
}

/// Link case entities through their relationship properties.
pub async fn link_cases_handler(State(state): State<AppState>) -> Response {
    let mut db = state.database.write().await;
    let result = db.link_cases().map(|report| {
        tracing::info!(
            linked = report.linked(),
            unlinked = report.unlinked(),
            "case edges"
        );
        report.rows
    });
    respond("GET /add-ngsi-patient-edge", result)
}
