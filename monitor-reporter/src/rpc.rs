//! Line-delimited JSON-RPC client for the local node.
//!
//! Every call dials a fresh TCP connection, writes a single request line and
//! reads a single response line. That keeps the client free of connection
//! state; the node is on the same host, so per-call dialing is cheap.

use monitor_types::rpc::{BlockResponse, CurrentBlock, NodeInfo, NodeStats};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::TcpStream;
use tracing::instrument;

/// Errors of a single JSON-RPC call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The node could not be reached or the connection broke mid-call.
    #[error("cannot reach node: {0}")]
    Transport(#[from] std::io::Error),
    /// The response line was not valid JSON.
    #[error("malformed node response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The call succeeded on the wire but the response has an unexpected
    /// shape, or the node answered with an error member.
    #[error("unexpected node response: {0}")]
    Protocol(String),
}

#[derive(Serialize)]
struct Request<'a, P: Serialize> {
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(serde::Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// JSON-RPC client for the local node.
#[derive(Debug, Clone)]
pub struct NodeRpc {
    url: String,
}

impl NodeRpc {
    /// Creates a new client for the given `host:port`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Issues one request/response pair on a fresh connection.
    async fn call<P: Serialize>(&self, method: &str, params: P) -> Result<Value, RpcError> {
        let mut stream = TcpStream::connect(&self.url).await?;
        let mut request =
            serde_json::to_vec(&Request { id: 1, method, params }).expect("Can serialize request");
        request.push(b'\n');
        stream.write_all(&request).await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(RpcError::Protocol(format!(
                "node closed connection without answering {method}"
            )));
        }
        let response = serde_json::from_str::<Response>(&line)?;
        if let Some(error) = response.error
            && !error.is_null()
        {
            return Err(RpcError::Protocol(format!("node returned error: {error}")));
        }
        response
            .result
            .ok_or_else(|| RpcError::Protocol(format!("missing result for {method}")))
    }

    /// Returns the node's metadata via `monitor_nodeInfo`.
    #[instrument(level = "trace", skip_all)]
    pub async fn node_info(&self) -> Result<NodeInfo, RpcError> {
        let result = self.call("monitor_nodeInfo", Value::Null).await?;
        serde_json::from_value(result)
            .map_err(|err| RpcError::Protocol(format!("node info: {err}")))
    }

    /// Returns the node's liveness statistics.
    ///
    /// `monitor_nodeStats` does not carry the hashrate, so a second
    /// `miner_getHashrate` call fills it in.
    #[instrument(level = "trace", skip_all)]
    pub async fn node_stats(&self) -> Result<NodeStats, RpcError> {
        let result = self.call("monitor_nodeStats", Value::Null).await?;
        let mut stats: NodeStats = serde_json::from_value(result)
            .map_err(|err| RpcError::Protocol(format!("node stats: {err}")))?;

        let result = self.call("miner_getHashrate", Value::Null).await?;
        stats.hashrate = result
            .as_u64()
            .ok_or_else(|| RpcError::Protocol(format!("hashrate is not an integer: {result}")))?;
        Ok(stats)
    }

    /// Returns the block at `height` via `seele_getBlockByHeight`.
    ///
    /// A height of `-1` selects the chain tip.
    #[instrument(level = "trace", skip_all)]
    pub async fn current_block(&self, height: i64, full_tx: bool) -> Result<CurrentBlock, RpcError> {
        let result = self
            .call("seele_getBlockByHeight", (height, full_tx))
            .await?;
        let response: BlockResponse = serde_json::from_value(result)
            .map_err(|err| RpcError::Protocol(format!("block: {err}")))?;
        Ok(CurrentBlock::from(response))
    }

    /// Returns the node's miner info map via `seele_getInfo`.
    #[instrument(level = "trace", skip_all)]
    pub async fn get_info(&self) -> Result<Map<String, Value>, RpcError> {
        let result = self.call("seele_getInfo", Value::Null).await?;
        match result {
            Value::Object(map) => Ok(map),
            other => Err(RpcError::Protocol(format!(
                "info is not an object: {other}"
            ))),
        }
    }
}
