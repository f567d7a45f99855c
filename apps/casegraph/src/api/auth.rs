//! # Authentication
//!
//! Optional bearer-key authentication.
//!
//! When `CASEGRAPH_API_KEY` is set to a non-empty value, every route except
//! `/health` requires `Authorization: Bearer <key>` (a bare `<key>` is
//! accepted too). The key is read once, when the router is built.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CASEGRAPH_API_KEY";

/// Routes reachable without a key.
const PUBLIC_PATHS: [&str; 1] = ["/health"];

/// The configured API key, shared by all requests.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    /// The key from `CASEGRAPH_API_KEY`, if set and non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .map(|k| Self::new(&k))
    }

    /// Compare in constant time over the longer of the two lengths.
    #[must_use]
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = provided.as_bytes();
        let len = expected.len().max(provided.len());

        let mut padded_expected = vec![0u8; len];
        let mut padded_provided = vec![0u8; len];
        padded_expected[..expected.len()].copy_from_slice(expected);
        padded_provided[..provided.len()].copy_from_slice(provided);

        let same_bytes: bool = padded_expected.ct_eq(&padded_provided).into();
        same_bytes && expected.len() == provided.len()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

/// Reject requests without the configured key.
pub async fn api_key_auth_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(candidate) if key.matches(candidate) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(event = "auth_failure", reason = "invalid_api_key", "rejected request");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "rejected request"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}
