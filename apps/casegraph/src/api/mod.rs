//! # casegraph HTTP API
//!
//! The HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /hello-world`, `GET /hello/{name}` - Greetings
//! - `POST /entries` - Store a JSON object in `entries`
//! - `GET /entries` - List entry keys
//! - `GET /foxx` - List entry documents
//! - `GET /type` - Each entry's `type`
//! - `GET /typese` - Entry attributes whose name matches `?pattern=` (default `e`)
//! - `GET /get-ngsi-att` - Each entry as a name/value map
//! - `GET /get-ngsi-relationship` - Relationship attributes of entries
//! - `GET /get-second-ngsi-relationship` - Nested relationship attributes
//! - `GET /add-ngsi-edge-key` - Link entries by key into `entryEdges`
//! - `GET /add-ngsi-edge-id` - Link entries by id into `entryEdges`
//! - `GET /csv-to-ngsi` - Synthesize case entities into `patientJSON`
//! - `GET /add-ngsi-patient-edge` - Link case entities into `patientEdge`
//! - `GET /health` - Health check
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CASEGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `CASEGRAPH_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `CASEGRAPH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, ApiKey};
pub use middleware::{RATE_LIMIT_ENV, create_rate_limiter, rate_limit_from_env};
pub use types::{AttributeQuery, HealthResponse, MAX_PATTERN_LENGTH};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use casegraph_core::{CasegraphError, Database};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding the allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "CASEGRAPH_CORS_ORIGINS";

/// Maximum request body size (2 MB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<RwLock<Database>>,
}

impl AppState {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database: Arc::new(RwLock::new(database)),
        }
    }
}

// =============================================================================
// ROUTER OPTIONS
// =============================================================================

/// Security settings applied around the routes.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Require this key on every route but `/health`.
    pub api_key: Option<ApiKey>,
    /// Requests per second, `0` for unlimited.
    pub rate_limit: u32,
    /// Raw `CASEGRAPH_CORS_ORIGINS` value.
    pub cors_origins: Option<String>,
}

impl RouterOptions {
    /// Read every setting from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: ApiKey::from_env(),
            rate_limit: rate_limit_from_env(),
            cors_origins: std::env::var(CORS_ORIGINS_ENV).ok(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// `*` allows every origin, a comma-separated list allows those origins,
/// anything else (or nothing valid) falls back to localhost.
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    let allowed: Vec<HeaderValue> = match origins {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins ({}=*)", CORS_ORIGINS_ENV);
            return CorsLayer::permissive();
        }
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                    None
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let allowed = if allowed.is_empty() {
        tracing::info!("CORS: defaulting to localhost only");
        [
            "http://localhost:3000",
            "http://localhost:8080",
            "http://127.0.0.1:3000",
            "http://127.0.0.1:8080",
        ]
        .into_iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect()
    } else {
        allowed
    };

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with security settings taken from the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, RouterOptions::from_env())
}

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router_with(state: AppState, options: RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/hello-world", get(handlers::hello_world_handler))
        .route("/hello/{name}", get(handlers::hello_handler))
        .route(
            "/entries",
            get(handlers::entry_keys_handler).post(handlers::create_entry_handler),
        )
        .route("/foxx", get(handlers::entries_handler))
        .route("/type", get(handlers::entry_types_handler))
        .route("/typese", get(handlers::entry_attributes_handler))
        .route("/get-ngsi-att", get(handlers::entry_attribute_maps_handler))
        .route(
            "/get-ngsi-relationship",
            get(handlers::entry_relationships_handler),
        )
        .route(
            "/get-second-ngsi-relationship",
            get(handlers::nested_entry_relationships_handler),
        )
        .route("/add-ngsi-edge-key", get(handlers::link_entries_by_key_handler))
        .route("/add-ngsi-edge-id", get(handlers::link_entries_by_id_handler))
        .route("/csv-to-ngsi", get(handlers::csv_to_ngsi_handler))
        .route("/add-ngsi-patient-edge", get(handlers::link_cases_handler));

    match options.api_key {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible. \
             Set {} to enable it.",
            API_KEY_ENV
        ),
    }

    match create_rate_limiter(options.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", options.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer(options.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Provision the managed collections, then serve until Ctrl+C.
pub async fn run_server(addr: &str, mut database: Database) -> Result<(), CasegraphError> {
    let report = database.provision()?;
    tracing::info!(
        created = ?report.created,
        existing = ?report.existing,
        "collections provisioned"
    );

    let router = create_router(AppState::new(database));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CasegraphError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("casegraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await
        .map_err(|e| CasegraphError::IoError(format!("Server error: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
