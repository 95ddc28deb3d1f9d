//! Response types of the node's JSON-RPC interface.
//!
//! The node is tolerant towards older peers, so every struct here fills
//! missing fields with their default instead of rejecting the response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node metadata returned by `monitor_nodeInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    /// Display name of the node.
    pub name: String,
    /// Enode-style identifier of the node.
    pub node: String,
    /// P2P listen port.
    pub port: u16,
    /// Network id the node is running on.
    #[serde(rename = "netVersion")]
    pub net_version: String,
    /// Protocol version string.
    pub protocol: String,
    /// Exposed API level.
    pub api: String,
    /// Operating system.
    pub os: String,
    /// Operating system version.
    #[serde(rename = "os_v")]
    pub os_ver: String,
    /// Client implementation and version.
    pub client: String,
    /// Whether the node can serve historic data.
    #[serde(rename = "canUpdateHistory")]
    pub can_update_history: bool,
    /// Shard the node is a member of.
    pub shard: u32,
}

/// Liveness statistics returned by `monitor_nodeStats`.
///
/// The hashrate is not part of the `monitor_nodeStats` response; the RPC
/// client merges it in from a separate `miner_getHashrate` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStats {
    /// Whether the node answers requests at all.
    pub active: bool,
    /// Whether the node is catching up with the chain.
    pub syncing: bool,
    /// Whether the node is mining.
    pub mining: bool,
    /// Current hashrate, merged from `miner_getHashrate`.
    pub hashrate: u64,
    /// Number of connected peers.
    pub peers: u32,
}

/// Header sub-object of a `seele_getBlockByHeight` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    /// Creation time of the block, seconds since the Unix epoch.
    #[serde(rename = "CreateTimestamp")]
    pub create_timestamp: i64,
    /// Difficulty of the block.
    #[serde(rename = "Difficulty")]
    pub difficulty: u64,
    /// Height of the block.
    #[serde(rename = "Height")]
    pub height: u64,
    /// Address of the block creator.
    #[serde(rename = "Creator")]
    pub creator: String,
}

/// Raw `seele_getBlockByHeight` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockResponse {
    /// Block header.
    pub header: BlockHeader,
    /// Hash of the block.
    pub hash: String,
    /// Transactions contained in the block; only their count matters here.
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// The chain tip as the monitoring layer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentBlock {
    /// Hash of the block.
    pub head_hash: String,
    /// Height of the block.
    pub height: u64,
    /// Creation time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Difficulty of the block.
    pub difficulty: u64,
    /// Address of the block creator.
    pub creator: String,
    /// Number of transactions in the block.
    pub tx_count: usize,
}

impl From<BlockResponse> for CurrentBlock {
    fn from(response: BlockResponse) -> Self {
        Self {
            head_hash: response.hash,
            height: response.header.height,
            timestamp: response.header.create_timestamp,
            difficulty: response.header.difficulty,
            creator: response.header.creator,
            tx_count: response.transactions.len(),
        }
    }
}
