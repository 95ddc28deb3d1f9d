//! Background consumer of frames from the stats server.

use tokio::sync::mpsc;

use crate::session::SessionReader;

/// Reads frames from the session until it yields an error, forwarding ping
/// replies to the latency measurement and dropping everything else.
///
/// The loop terminates, and with it the session, when the server sends a
/// non-broadcast, when a pong arrives that nobody is waiting for (the pinger
/// has died), or when the read side fails. The reporter observes the
/// termination and reconnects.
pub(crate) async fn read_loop(mut reader: SessionReader, pong_tx: mpsc::Sender<()>) {
    loop {
        let frame = match reader.read_json().await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("failed to decode stats server message: {err}");
                return;
            }
        };
        tracing::debug!("received message from stats server: {frame:?}");
        if frame.emit.is_empty() {
            tracing::warn!("stats server sent non-broadcast: {frame:?}");
            return;
        }
        let Some(command) = frame.command() else {
            tracing::warn!("invalid stats server message type: {:?}", frame.emit[0]);
            return;
        };
        // A ping reply is delivered without blocking; a rejected delivery
        // means no measurement is in flight, so the pinger must be gone.
        if command == "node-pong" && frame.emit.len() == 2 {
            match pong_tx.try_send(()) {
                Ok(()) => continue,
                Err(_) => {
                    tracing::warn!("stats server pinger seems to have died");
                    return;
                }
            }
        }
        tracing::info!("stats message: {frame:?}");
    }
}
