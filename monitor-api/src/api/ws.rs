//! Inbound websocket ping responder.
//!
//! Other agents probe this endpoint to measure how reachable the daemon is.
//! The contract is deliberately tiny: a `node-ping` frame gets a `node-pong`
//! reply, any other text frame is echoed back verbatim, binary frames are
//! ignored. The endpoint shares nothing with the outbound reporter beyond
//! the frame vocabulary.

use std::time::SystemTime;

use axum::{
    Router,
    extract::{
        WebSocketUpgrade,
        ws::{self, WebSocket},
    },
    response::Response,
    routing::any,
};
use monitor_types::report::{InboundFrame, PongReply, ReportFrame, ReportTopic};

/// Creates a `Router` with the ping responder on the given path.
///
/// Clients upgrade their connection via the websocket upgrade protocol; the
/// route accepts `any` method so both HTTP/1.1 and HTTP/2.0 upgrades work.
pub(crate) fn routes(path: &str, endpoint_id: String) -> Router {
    Router::new().route(
        path,
        any(move |websocket_upgrade| handle_upgrade(websocket_upgrade, endpoint_id.clone())),
    )
}

async fn handle_upgrade(websocket_upgrade: WebSocketUpgrade, endpoint_id: String) -> Response {
    websocket_upgrade
        .on_failed_upgrade(|err| {
            tracing::warn!("could not establish websocket connection: {err:?}");
        })
        .on_upgrade(move |socket| ping_pong_loop(socket, endpoint_id))
}

/// The per-connection loop.
///
/// Runs until the peer closes the connection or a read/write fails.
async fn ping_pong_loop(mut socket: WebSocket, endpoint_id: String) {
    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!("inbound websocket read error: {err}");
                return;
            }
        };
        match message {
            ws::Message::Text(text) => {
                let is_ping = serde_json::from_str::<InboundFrame>(text.as_str())
                    .map(|frame| frame.command() == Some("node-ping") && frame.emit.len() == 2)
                    .unwrap_or(false);
                let reply = if is_ping {
                    let pong = ReportFrame::new(
                        ReportTopic::NodePong,
                        PongReply {
                            id: endpoint_id.clone(),
                            client_time: humantime::format_rfc3339_millis(SystemTime::now())
                                .to_string(),
                        },
                    );
                    ws::Message::text(serde_json::to_string(&pong).expect("Can serialize msg"))
                } else {
                    // anything that is not a ping goes back verbatim
                    ws::Message::Text(text)
                };
                if let Err(err) = socket.send(reply).await {
                    tracing::debug!("inbound websocket write error: {err}");
                    return;
                }
            }
            // only text frames are served
            ws::Message::Binary(_) => continue,
            ws::Message::Close(close) => {
                tracing::debug!("inbound websocket closed: {close:?}");
                return;
            }
            // ping/pong control frames are answered by axum itself
            _ => continue,
        }
    }
}
