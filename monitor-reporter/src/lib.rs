#![deny(missing_docs, clippy::unwrap_used)]
//! Stats reporting core for a Seele node.
//!
//! The entry point is the [`Reporter`]: a long-lived state machine that
//! discovers the node's shard, dials the matching stats server over a
//! websocket and pushes periodic telemetry reports until the session dies,
//! at which point it reconnects from scratch. See [`reporter`] for the
//! lifecycle and [`session`] for the transport.
//!
//! The building blocks are exposed for embedders and tests:
//!
//! * [`rpc::NodeRpc`] – typed JSON-RPC calls to the local node.
//! * [`shards::ShardDirectory`] – shard id to stats-server base URL mapping.
//! * [`session::Session`] – outbound websocket framing.
//! * [`debounce::ErrorDebouncer`] – degraded-status escalation counter.

use tokio_tungstenite::tungstenite;

pub mod debounce;
pub mod metrics;
pub mod rpc;
pub mod session;
pub mod shards;

mod collect;
mod reader;
pub mod reporter;

pub use reporter::{Reporter, ReporterArgs, reporter_task};

/// Errors a reporting session may encounter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call to the node's JSON-RPC interface failed.
    #[error(transparent)]
    Rpc(#[from] rpc::RpcError),
    /// No dial attempt against the stats server succeeded.
    #[error("stats server unreachable: {0}")]
    Unreachable(String),
    /// Wrapping inner tungstenite error.
    #[error(transparent)]
    Ws(#[from] tungstenite::Error),
    /// An inbound frame was not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The stats server did not answer a latency probe in time.
    #[error("ping timed out")]
    PingTimeout,
    /// The session ended (close frame, EOF, or reader termination).
    #[error("stats server session ended")]
    SessionClosed,
    /// No stats server is configured for the shard the node reports.
    ///
    /// This is a configuration error; the reporter gives up instead of
    /// fabricating a URL.
    #[error("no stats server configured for shard {0}")]
    UnknownShard(u32),
}

/// The operator-visible name of this node.
///
/// `INSTANCE_NAME` wins when set, the OS hostname is the fallback.
pub fn instance_hostname() -> String {
    match std::env::var("INSTANCE_NAME") {
        Ok(name) if !name.is_empty() => name,
        _ => hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
