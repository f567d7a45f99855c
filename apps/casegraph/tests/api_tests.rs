//! Integration tests for the casegraph HTTP API.
//!
//! Uses axum-test to exercise the routes without starting a real server.
//! Security settings are passed explicitly, so no test touches the
//! environment.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, header};
use axum_test::TestServer;
use casegraph::api::{ApiKey, AppState, HealthResponse, RouterOptions, create_router_with};
use casegraph_core::Database;
use serde_json::{Value, json};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn server_for(database: Database, options: RouterOptions) -> TestServer {
    TestServer::new(create_router_with(AppState::new(database), options)).unwrap()
}

/// A test server over a provisioned, empty in-memory database.
fn create_test_server() -> TestServer {
    let mut database = Database::new();
    database.provision().unwrap();
    server_for(database, RouterOptions::default())
}

/// A test server whose source collection already holds `csv`.
fn create_case_server(csv: &str) -> TestServer {
    let mut database = Database::new();
    database.provision().unwrap();
    database.ingest_csv(csv.as_bytes()).unwrap();
    server_for(database, RouterOptions::default())
}

async fn post_entry(server: &TestServer, entry: Value) -> Value {
    let response = server.post("/entries").json(&entry).await;
    response.assert_status_ok();
    response.json()
}

// =============================================================================
// GREETING & HEALTH TESTS
// =============================================================================

#[tokio::test]
async fn test_hello_world() {
    let server = create_test_server();

    let response = server.get("/hello-world").await;
    response.assert_status_ok();
    response.assert_text("Hello World");
}

#[tokio::test]
async fn test_hello_name() {
    let server = create_test_server();

    let response = server.get("/hello/Ada").await;
    response.assert_status_ok();
    response.assert_text("Hello Ada");
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// ENTRY TESTS
// =============================================================================

#[tokio::test]
async fn test_post_entry_returns_stored_document() {
    let server = create_test_server();

    let stored = post_entry(&server, json!({"type": "Person", "name": "Alice"})).await;
    assert_eq!(stored["_key"], json!("1"));
    assert_eq!(stored["_id"], json!("entries/1"));
    assert_eq!(stored["name"], json!("Alice"));
}

#[tokio::test]
async fn test_entry_listings() {
    let server = create_test_server();
    post_entry(&server, json!({"_key": "alice", "type": "Person", "name": "Alice"})).await;
    post_entry(&server, json!({"_key": "bob", "name": "Bob"})).await;

    let keys: Value = server.get("/entries").await.json();
    assert_eq!(keys, json!(["alice", "bob"]));

    let types: Value = server.get("/type").await.json();
    assert_eq!(types, json!(["Person", null]));

    let docs: Value = server.get("/foxx").await.json();
    assert_eq!(docs[0]["name"], json!("Alice"));
    assert_eq!(docs[1]["_id"], json!("entries/bob"));

    let maps: Value = server.get("/get-ngsi-att").await.json();
    assert_eq!(maps[1]["name"], json!("Bob"));
}

#[tokio::test]
async fn test_typese_default_and_custom_pattern() {
    let server = create_test_server();
    post_entry(&server, json!({"_key": "k1", "name": "Alice", "age": 30, "city": "Oslo"})).await;

    let default: Value = server.get("/typese").await.json();
    assert_eq!(
        default,
        json!([[
            {"name": "_key", "value": "k1"},
            {"name": "name", "value": "Alice"},
            {"name": "age", "value": 30}
        ]])
    );

    let custom: Value = server.get("/typese").add_query_param("pattern", "city").await.json();
    assert_eq!(custom, json!([[{"name": "city", "value": "Oslo"}]]));
}

#[tokio::test]
async fn test_typese_rejects_oversized_pattern() {
    let server = create_test_server();

    let response = server
        .get("/typese")
        .add_query_param("pattern", "x".repeat(300))
        .await;
    response.assert_status_ok();
    assert!(response.text().contains("exceeds maximum"));
}

#[tokio::test]
async fn test_relationship_listings() {
    let server = create_test_server();
    post_entry(
        &server,
        json!({
            "_key": "a",
            "isFriendOf": {"type": "Relationship", "object": "b"},
            "infectedBy": {
                "type": "Relationship",
                "object": "c",
                "reportedBy": {"type": "Relationship", "object": "lab-1"}
            }
        }),
    )
    .await;

    let first: Value = server.get("/get-ngsi-relationship").await.json();
    assert_eq!(
        first,
        json!([
            {"relationship": "isFriendOf", "key": "b"},
            {"relationship": "infectedBy", "key": "c"}
        ])
    );

    let second: Value = server.get("/get-second-ngsi-relationship").await.json();
    assert_eq!(second, json!([{"relationship": "reportedBy", "key": "lab-1"}]));
}

// =============================================================================
// EDGE JOB TESTS
// =============================================================================

#[tokio::test]
async fn test_link_entries_by_key() {
    let server = create_test_server();
    post_entry(
        &server,
        json!({"_key": "alice", "isFriendOf": {"type": "Relationship", "object": "bob"}}),
    )
    .await;
    post_entry(&server, json!({"_key": "bob"})).await;

    let rows: Value = server.get("/add-ngsi-edge-key").await.json();
    assert_eq!(
        rows,
        json!([{
            "id": "entries/alice",
            "relationship": "isFriendOf",
            "key": "bob",
            "test": "entries/bob"
        }])
    );
}

#[tokio::test]
async fn test_link_entries_by_id_skips_unknown_targets() {
    let server = create_test_server();
    post_entry(
        &server,
        json!({
            "_key": "a",
            "id": "urn:a",
            "isNear": {"type": "Relationship", "object": "urn:b"},
            "ownedBy": {"type": "Relationship", "object": "urn:missing"}
        }),
    )
    .await;
    post_entry(&server, json!({"_key": "b", "id": "urn:b"})).await;

    let rows: Value = server.get("/add-ngsi-edge-id").await.json();
    assert_eq!(
        rows,
        json!([{
            "fromId": "entries/a",
            "relationship": "isNear",
            "toId": "urn:b",
            "toKey": "entries/b"
        }])
    );
}

// =============================================================================
// CASE PIPELINE TESTS
// =============================================================================

#[tokio::test]
async fn test_csv_to_ngsi_then_patient_edges() {
    let server = create_case_server("patient_id,by_patient,state\nB,,isolated\nA,B,released\n");

    let rows: Value = server.get("/csv-to-ngsi").await.json();
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
    assert_eq!(rows[1]["id"], json!("A"));
    assert_eq!(rows[1]["infectionBy_object"], json!("B"));
    assert_eq!(rows[1]["infectionStatus"], json!("released"));

    let edges: Value = server.get("/add-ngsi-patient-edge").await.json();
    assert_eq!(edges.as_array().map(Vec::len), Some(1));
    assert_eq!(edges[0]["from"], json!("urn:covid-10:case:00A"));
    assert_eq!(edges[0]["to"], json!("urn:covid-10:case:00B"));
    assert_eq!(edges[0]["toKey"], json!("patientJSON/1"));
}

#[tokio::test]
async fn test_patient_edges_repeat_on_second_run() {
    let server = create_case_server("patient_id,by_patient\nB,\nA,B\n");
    server.get("/csv-to-ngsi").await.assert_status_ok();

    let first: Value = server.get("/add-ngsi-patient-edge").await.json();
    let second: Value = server.get("/add-ngsi-patient-edge").await.json();
    assert_eq!(first, second);
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_unprovisioned_collection_reports_error_text() {
    let server = server_for(Database::new(), RouterOptions::default());

    let response = server.get("/entries").await;
    response.assert_status_ok();
    response.assert_text("collection or view not found: entries");
}

#[tokio::test]
async fn test_csv_to_ngsi_without_source_reports_error_text() {
    let server = create_test_server();

    let response = server.get("/csv-to-ngsi").await;
    response.assert_status_ok();
    response.assert_text("collection or view not found: originCSV");
}

#[tokio::test]
async fn test_post_non_object_is_client_error() {
    let server = create_test_server();

    let response = server.post("/entries").json(&json!([1, 2, 3])).await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = create_test_server();

    let response = server
        .post("/entries")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let server = create_test_server();

    server.get("/unknown").await.assert_status_not_found();
}

// =============================================================================
// AUTHENTICATION TESTS
// =============================================================================

fn create_auth_test_server(key: &str) -> TestServer {
    let mut database = Database::new();
    database.provision().unwrap();
    server_for(
        database,
        RouterOptions {
            api_key: Some(ApiKey::new(key)),
            ..RouterOptions::default()
        },
    )
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let server = create_auth_test_server("test-secret-key");

    let response = server
        .get("/entries")
        .add_header(
            header::AUTHORIZATION,
            "Bearer test-secret-key".parse::<HeaderValue>().unwrap(),
        )
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_missing_or_wrong_token_rejected() {
    let server = create_auth_test_server("test-secret-key");

    server.get("/entries").await.assert_status_unauthorized();

    let response = server
        .get("/entries")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_health_is_public() {
    let server = create_auth_test_server("test-secret-key");

    server.get("/health").await.assert_status_ok();
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_answers_429() {
    let server = server_for(
        Database::new(),
        RouterOptions {
            rate_limit: 1,
            ..RouterOptions::default()
        },
    );

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;
    assert_eq!(response.status_code().as_u16(), 429);
}
