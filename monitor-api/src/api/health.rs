//! Health Check Endpoint
//!
//! Provides a simple HTTP status response to indicate the daemon's status.
//!
//! - `/health` – general health check
//!
//! The endpoint includes a `Cache-Control: no-cache` header to prevent
//! caching of responses.

use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Create a router containing the health endpoint.
pub(crate) fn routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
}

/// General health check endpoint.
///
/// Returns `200 OK` with a plain `"healthy"` response once the daemon
/// serves requests.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
