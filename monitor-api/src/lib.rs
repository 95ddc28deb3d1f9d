#![deny(missing_docs)]
//! Library part of the Seele monitoring daemon.
//!
//! The binary in `src/bin/monitor-api.rs` is a thin shell around this crate:
//! [`config::MonitorConfig`] carries the full configuration surface and
//! [`router`] builds the inbound HTTP/websocket endpoints. Exposing both
//! here lets the integration tests drive the endpoints in-process.
//!
//! The outbound reporting machinery lives in `seele-monitor-reporter`; this
//! crate only wires it up.

use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::MonitorConfig;

mod api;
pub mod config;

/// Builds the inbound router: `/health`, plus the websocket ping responder
/// on the configured path when websockets are enabled.
///
/// `endpoint_id` is the identifier the ping responder stamps on its replies
/// (`hostname + "_" + local address`).
pub fn router(config: &MonitorConfig, endpoint_id: String) -> Router {
    let mut router = Router::new().merge(api::health::routes());
    if config.enable_websocket {
        router = router.merge(api::ws::routes(&config.ws_router, endpoint_id));
    }
    let mut router = router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout));
    if config.connection_limit > 0 {
        router = router.layer(ConcurrencyLimitLayer::new(config.connection_limit));
    }
    router
}
