//! Frames exchanged with the stats server.
//!
//! Every websocket message, in both directions, is a JSON object of the shape
//! `{"emit": [<topic>, <payload>]}`. Outbound frames are built through
//! [`ReportFrame`] so the topic/payload pairing is checked at compile time.
//! Inbound frames arrive as [`InboundFrame`], which keeps the `emit` list
//! loosely typed because the server is free to broadcast anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::{CurrentBlock, NodeStats};

/// Topics understood by the stats server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportTopic {
    /// Aggregated first frame of a session.
    #[serde(rename = "hello")]
    Hello,
    /// Node metadata.
    #[serde(rename = "nodeInfo")]
    NodeInfo,
    /// Liveness statistics (also carries the synthetic degraded report).
    #[serde(rename = "stats")]
    Stats,
    /// Chain tip advance.
    #[serde(rename = "block")]
    Block,
    /// Measured one-way latency.
    #[serde(rename = "latency")]
    Latency,
    /// Latency probe.
    #[serde(rename = "node-ping")]
    NodePing,
    /// Reply to a latency probe.
    #[serde(rename = "node-pong")]
    NodePong,
}

/// Outbound envelope `{"emit": [<topic>, <payload>]}`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportFrame<T> {
    /// The topic/payload pair, serialized as a two-element list.
    pub emit: (ReportTopic, T),
}

impl<T> ReportFrame<T> {
    /// Wraps a payload into the emit envelope.
    pub fn new(topic: ReportTopic, payload: T) -> Self {
        Self {
            emit: (topic, payload),
        }
    }
}

/// Inbound envelope.
///
/// The `emit` list is kept as raw JSON values; consumers classify frames by
/// inspecting the first element. A frame without an `emit` member
/// deserializes with an empty list, which readers treat as a non-broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// The raw emit list.
    #[serde(default)]
    pub emit: Vec<Value>,
}

impl InboundFrame {
    /// The command of the frame: the first `emit` element, when it is a string.
    pub fn command(&self) -> Option<&str> {
        self.emit.first()?.as_str()
    }
}

/// Node metadata as the stats server displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfoReport {
    /// Name of the reporting daemon.
    pub name: String,
    /// Enode-style identifier of the node.
    pub node: String,
    /// Advertised daemon port.
    pub port: u16,
    /// Protocol version of the node.
    pub protocol: String,
    /// Exposed API level; mirrors the protocol version.
    pub api: String,
    /// Operating system of the node.
    pub os: String,
    /// Operating system version of the node.
    #[serde(rename = "os_v")]
    pub os_ver: String,
    /// Client implementation and version of the node.
    pub client: String,
    /// Version of the reporting daemon.
    #[serde(rename = "nodeVersion")]
    pub node_version: String,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Payload of a `nodeInfo` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfoPayload {
    /// Stable node identifier (`hostname + "_" + coinbase`).
    pub id: String,
    /// The node metadata.
    pub info: NodeInfoReport,
}

/// Payload of a `stats` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatsPayload {
    /// Stable node identifier.
    pub id: String,
    /// The liveness statistics.
    pub stats: NodeStats,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// The chain tip as the stats server displays it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    /// Hash of the block.
    #[serde(rename = "headHash")]
    pub head_hash: String,
    /// Height of the block.
    pub height: u64,
    /// Creation time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Difficulty of the block.
    pub difficulty: u64,
    /// Address of the block creator.
    pub miner: String,
    /// Number of transactions in the block.
    pub txcount: usize,
}

impl From<CurrentBlock> for BlockReport {
    fn from(block: CurrentBlock) -> Self {
        Self {
            head_hash: block.head_hash,
            height: block.height,
            timestamp: block.timestamp,
            difficulty: block.difficulty,
            miner: block.creator,
            txcount: block.tx_count,
        }
    }
}

/// Payload of a `block` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPayload {
    /// Stable node identifier.
    pub id: String,
    /// The chain tip.
    pub block: BlockReport,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Payload of a `latency` frame.
///
/// The latency is the one-way estimate in milliseconds, formatted to one
/// decimal place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyPayload {
    /// Stable node identifier.
    pub id: String,
    /// One-way latency in milliseconds, one decimal place.
    pub latency: String,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Payload of an outbound `node-ping` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingPayload {
    /// Stable node identifier.
    pub id: String,
    /// Send time of the probe, milliseconds since the Unix epoch.
    #[serde(rename = "clientTime")]
    pub client_time: i64,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Payload of the aggregated `hello` frame opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Stable node identifier.
    pub id: String,
    /// Node metadata.
    pub info: NodeInfoReport,
    /// Chain tip.
    pub block: BlockReport,
    /// Liveness statistics.
    pub stats: NodeStats,
    /// One-way latency in milliseconds, one decimal place.
    pub latency: String,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Statistics body of the synthetic degraded report.
///
/// Both flags are always false; the frame exists to flip the node to
/// inactive on the monitoring page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DegradedStats {
    /// Always false.
    pub active: bool,
    /// Always false.
    pub syncing: bool,
}

/// Payload of the synthetic degraded `stats` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedStatsPayload {
    /// Stable node identifier.
    pub id: String,
    /// The degraded statistics body.
    pub stats: DegradedStats,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Payload of a `node-pong` reply sent by the inbound ping responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongReply {
    /// Identifier of the answering endpoint (`hostname + "_" + local address`).
    pub id: String,
    /// Human readable reply time.
    #[serde(rename = "clientTime")]
    pub client_time: String,
}
