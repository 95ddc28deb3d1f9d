//! Metric collectors: each wraps one node RPC call and shapes the payload
//! the stats server expects. Every failure feeds the error debouncer, which
//! may push a synthetic degraded report onto the session.

use monitor_types::report::{
    BlockPayload, BlockReport, DegradedStats, DegradedStatsPayload, NodeInfoPayload,
    NodeInfoReport, NodeStatsPayload, ReportTopic,
};
use serde_json::Value;

use crate::metrics::{METRICS_ID_REPORTER_COLLECT_ERRORS, METRICS_ID_REPORTER_DEGRADED_REPORTS};
use crate::reporter::Reporter;
use crate::rpc::RpcError;
use crate::session::Session;
use crate::Error;

/// Height argument selecting the chain tip.
const BLOCK_TIP_HEIGHT: i64 = -1;

impl Reporter {
    /// Looks up the node's coinbase, the stable per-session discriminator.
    ///
    /// A missing or non-string `Coinbase` entry is a protocol error.
    pub(crate) async fn coinbase(&mut self, session: &mut Session) -> Result<String, Error> {
        let info = match self.rpc.get_info().await {
            Ok(info) => info,
            Err(err) => {
                tracing::error!("rpc get_info error: {err}");
                self.record_collect_error(session).await;
                return Err(err.into());
            }
        };
        match info.get("Coinbase").and_then(Value::as_str) {
            Some(coinbase) => Ok(coinbase.to_owned()),
            None => Err(RpcError::Protocol("coinbase is missing or not a string".to_owned()).into()),
        }
    }

    /// Collects the node metadata and refreshes the shard and net version
    /// the reporter stamps on every frame.
    pub(crate) async fn node_info_payload(
        &mut self,
        session: &mut Session,
    ) -> Result<NodeInfoPayload, Error> {
        let info = match self.rpc.node_info().await {
            Ok(info) => info,
            Err(err) => {
                tracing::error!("rpc node_info error: {err}");
                self.record_collect_error(session).await;
                return Err(err.into());
            }
        };
        self.net_version = info.net_version;
        self.shard = info.shard;
        Ok(NodeInfoPayload {
            id: self.node_id.clone(),
            info: NodeInfoReport {
                name: self.app_name.clone(),
                node: info.node,
                port: self.advertised_port,
                api: info.protocol.clone(),
                protocol: info.protocol,
                os: info.os,
                os_ver: info.os_ver,
                client: info.client,
                node_version: env!("CARGO_PKG_VERSION").to_owned(),
                net_version: self.net_version.clone(),
                shard: self.shard,
            },
        })
    }

    /// Collects the node's liveness statistics (including the merged
    /// hashrate).
    pub(crate) async fn node_stats_payload(
        &mut self,
        session: &mut Session,
    ) -> Result<NodeStatsPayload, Error> {
        let stats = match self.rpc.node_stats().await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!("rpc node_stats error: {err}");
                self.record_collect_error(session).await;
                return Err(err.into());
            }
        };
        Ok(NodeStatsPayload {
            id: self.node_id.clone(),
            stats,
            net_version: self.net_version.clone(),
            shard: self.shard,
        })
    }

    /// Collects the chain tip and remembers its height for the
    /// forward-progress gate of the block report.
    pub(crate) async fn current_block_payload(
        &mut self,
        session: &mut Session,
    ) -> Result<BlockPayload, Error> {
        let block = match self.rpc.current_block(BLOCK_TIP_HEIGHT, true).await {
            Ok(block) => block,
            Err(err) => {
                tracing::error!("rpc current_block error: {err}");
                self.record_collect_error(session).await;
                return Err(err.into());
            }
        };
        self.current_block_height = block.height;
        Ok(BlockPayload {
            id: self.node_id.clone(),
            block: BlockReport::from(block),
            net_version: self.net_version.clone(),
            shard: self.shard,
        })
    }

    /// Feeds the debouncer and, at the threshold, pushes the synthetic
    /// degraded report.
    ///
    /// The degraded report is best-effort: its own send error is only
    /// logged, the collector failure that triggered it still propagates at
    /// the call site.
    async fn record_collect_error(&mut self, session: &mut Session) {
        metrics::counter!(METRICS_ID_REPORTER_COLLECT_ERRORS).increment(1);
        if !self.debouncer.record_failure() {
            return;
        }
        tracing::error!("collectors keep failing, reporting node as inactive");
        metrics::counter!(METRICS_ID_REPORTER_DEGRADED_REPORTS).increment(1);
        let payload = DegradedStatsPayload {
            id: self.node_id.clone(),
            stats: DegradedStats::default(),
            net_version: self.net_version.clone(),
            shard: self.shard,
        };
        if let Err(err) = self
            .send_report(session, ReportTopic::Stats, &payload)
            .await
        {
            tracing::warn!("could not report degraded status: {err}");
        }
    }
}
