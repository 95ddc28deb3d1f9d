//! HTTP endpoints served by the monitoring daemon:
//!
//! - [`health`] – liveness probe (`/health`).
//! - [`ws`] – the websocket ping responder on the configured router path.

pub(crate) mod health;
pub(crate) mod ws;
