//! Outbound websocket session to the stats server.
//!
//! This module exposes a thin wrapper around a tungstenite web-socket. The
//! session handles errors very conservatively: anything unexpected
//! terminates it and the reporter starts over with a fresh connection.
//!
//! The closing handshake is best-effort. We try to send `Close` frames when
//! we tear a session down, but errors while doing so are ignored.
//!
//! [`Session::dial`] splits the socket into a write half ([`Session`]) and a
//! read half ([`SessionReader`]). The reporter task keeps the write half and
//! hands the read half to the inbound reader task, so sends and receives can
//! never race on the same side of the stream.

use std::time::Duration;

use futures::{
    SinkExt as _, StreamExt as _,
    stream::{SplitSink, SplitStream},
};
use monitor_types::report::InboundFrame;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        self,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::Error;

/// Schemes tried, in order, when the configured target carries none.
const SCHEME_PREFERENCE: [&str; 4] = ["wss", "ws", "https", "http"];

/// The write half of a stats-server session.
pub struct Session<S = MaybeTlsStream<TcpStream>> {
    sink: SplitSink<WebSocketStream<S>, tungstenite::Message>,
}

/// The read half of a stats-server session.
pub struct SessionReader<S = MaybeTlsStream<TcpStream>> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Expands an unschemed `host:port` target into the dial candidate list.
fn candidate_urls(target: &str) -> Vec<String> {
    if target.contains("://") {
        vec![target.to_owned()]
    } else {
        SCHEME_PREFERENCE
            .iter()
            .map(|scheme| format!("{scheme}://{target}"))
            .collect()
    }
}

impl Session {
    /// Dials the stats server, preferring TLS but falling back to plain
    /// websockets.
    ///
    /// Every candidate URL is tried with the same `dial_timeout`; the first
    /// successful connection wins. `http`/`https` candidates are dialed with
    /// the equivalent websocket scheme.
    pub async fn dial(
        target: &str,
        dial_timeout: Duration,
    ) -> Result<(Session, SessionReader), Error> {
        let mut last_error = String::from("no dial candidates");
        for candidate in candidate_urls(target) {
            let url = candidate
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1);
            match tokio::time::timeout(dial_timeout, tokio_tungstenite::connect_async(&url)).await
            {
                Ok(Ok((socket, _response))) => {
                    tracing::debug!("connected to stats server via {candidate}");
                    return Ok(Self::from_socket(socket));
                }
                Ok(Err(err)) => {
                    tracing::debug!("dial {candidate} failed: {err}");
                    last_error = err.to_string();
                }
                Err(_) => {
                    tracing::debug!("dial {candidate} timed out after {dial_timeout:?}");
                    last_error = format!("{candidate}: dial timed out");
                }
            }
        }
        Err(Error::Unreachable(last_error))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wraps an established web-socket into a session pair.
    pub fn from_socket(socket: WebSocketStream<S>) -> (Session<S>, SessionReader<S>) {
        let (sink, stream) = socket.split();
        (Session { sink }, SessionReader { stream })
    }

    /// Sends the provided message as a single JSON text frame.
    pub async fn send_json<Msg: Serialize>(&mut self, msg: &Msg) -> Result<(), Error> {
        let text = serde_json::to_string(msg).expect("Can serialize msg");
        self.sink.send(tungstenite::Message::text(text)).await?;
        Ok(())
    }

    /// Closes the session by sending a `Close` frame on a best-effort basis.
    pub async fn close(mut self) {
        let _ = self
            .sink
            .send(tungstenite::Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "reconnect".into(),
            })))
            .await;
        let _ = self.sink.close().await;
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SessionReader<S> {
    /// Reads the next JSON frame from the session.
    ///
    /// Control frames are handled transparently; a `Close` frame or EOF ends
    /// the session, a frame that is not valid JSON is an error.
    pub async fn read_json(&mut self) -> Result<InboundFrame, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Ok(serde_json::from_str(text.as_str())?);
                }
                Some(Ok(tungstenite::Message::Binary(bytes))) => {
                    return Ok(serde_json::from_slice(bytes.as_ref())?);
                }
                Some(Ok(tungstenite::Message::Close(close))) => {
                    tracing::debug!("stats server sent close frame: {close:?}");
                    return Err(Error::SessionClosed);
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(Error::Ws(err)),
                None => return Err(Error::SessionClosed),
            }
        }
    }
}
