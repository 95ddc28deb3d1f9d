//! The reporting state machine.
//!
//! [`Reporter::run`] keeps a session to the stats server alive for the
//! lifetime of the process:
//!
//! ```text
//! DISCOVER -> DIAL -> HANDSHAKE -> STEADY -(error)-> CLOSE -> backoff -> DISCOVER
//! ```
//!
//! DISCOVER asks the node for its shard and resolves the matching stats
//! server. DIAL establishes the websocket. HANDSHAKE spawns the inbound
//! reader, learns the node's coinbase (which fixes the session's `id`) and
//! pushes the aggregated `hello` frame. STEADY runs two tickers: the full
//! cadence measures latency and reports stats, the block cadence reports
//! chain-tip advances. Any error tears the session down and restarts from
//! DISCOVER after a backoff.
//!
//! All sends happen on this task; the reader task only receives. The two
//! meet at a single-slot pong channel that is recreated per session so a
//! late pong can never leak into the next session.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use monitor_types::report::{LatencyPayload, PingPayload, ReportFrame, ReportTopic};
use serde::Serialize;

use crate::debounce::ErrorDebouncer;
use crate::metrics::{
    METRICS_ID_REPORTER_BLOCK_HEIGHT, METRICS_ID_REPORTER_DIAL_FAILURES,
    METRICS_ID_REPORTER_FRAMES_SENT, METRICS_ID_REPORTER_PONG_TIMEOUTS,
    METRICS_ID_REPORTER_SESSIONS,
};
use crate::reader::read_loop;
use crate::rpc::NodeRpc;
use crate::session::Session;
use crate::shards::ShardDirectory;
use crate::{Error, instance_hostname};

/// Retry delay while the node does not answer `monitor_nodeInfo`.
const DISCOVER_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Per-candidate timeout when dialing the stats server.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a latency probe waits for its pong.
const PONG_TIMEOUT: Duration = Duration::from_secs(5);

/// The arguments to construct a [`Reporter`].
pub struct ReporterArgs {
    /// Client for the local node's JSON-RPC interface.
    pub rpc: NodeRpc,
    /// Shard to stats-server mapping.
    pub shards: ShardDirectory,
    /// Name the daemon reports as `nodeInfo.name`.
    pub app_name: String,
    /// Port the daemon advertises as `nodeInfo.port`.
    pub advertised_port: u16,
    /// Routing suffix appended to the shard's base URL.
    pub ws_router: String,
    /// Cadence of the full report (latency + stats).
    pub full_event_interval: Duration,
    /// Cadence of the chain-tip report.
    pub block_event_interval: Duration,
    /// Backoff after a failed dial round.
    pub reconnect_delay: Duration,
    /// Backoff after a handshake or steady-state error.
    pub resend_delay: Duration,
    /// Consecutive collector failures before a degraded report.
    pub report_error_after: u32,
}

/// Long-lived reporting daemon state. One per process.
pub struct Reporter {
    pub(crate) rpc: NodeRpc,
    shards: ShardDirectory,
    hostname: String,
    /// `hostname + "_" + coinbase`; fixed per session at handshake time.
    pub(crate) node_id: String,
    pub(crate) app_name: String,
    pub(crate) advertised_port: u16,
    ws_router: String,
    pub(crate) shard: u32,
    pub(crate) net_version: String,
    /// Highest height ever reported; monotone over the process lifetime.
    latest_block_height: u64,
    pub(crate) current_block_height: u64,
    pub(crate) debouncer: ErrorDebouncer,
    full_event_interval: Duration,
    block_event_interval: Duration,
    reconnect_delay: Duration,
    resend_delay: Duration,
}

impl Reporter {
    /// Creates a reporter ready to [`run`](Self::run).
    ///
    /// The hostname is resolved once, here: `INSTANCE_NAME` wins over the OS
    /// hostname.
    pub fn new(args: ReporterArgs) -> Self {
        let ReporterArgs {
            rpc,
            shards,
            app_name,
            advertised_port,
            ws_router,
            full_event_interval,
            block_event_interval,
            reconnect_delay,
            resend_delay,
            report_error_after,
        } = args;
        let hostname = instance_hostname();
        Self {
            rpc,
            shards,
            node_id: hostname.clone(),
            hostname,
            app_name,
            advertised_port,
            ws_router,
            shard: 0,
            net_version: String::new(),
            latest_block_height: 0,
            current_block_height: 0,
            debouncer: ErrorDebouncer::new(report_error_after),
            full_event_interval,
            block_event_interval,
            reconnect_delay,
            resend_delay,
        }
    }

    /// Runs the reporting loop until the token is cancelled.
    ///
    /// Only configuration errors escape as `Err`; every transport, protocol
    /// or timeout error is handled by reconnecting.
    pub async fn run(mut self, cancellation_token: CancellationToken) -> Result<(), Error> {
        tokio::select! {
            result = self.report_loop() => result,
            _ = cancellation_token.cancelled() => {
                tracing::info!("reporter shutting down");
                Ok(())
            }
        }
    }

    /// Keeps reconnecting and reporting until a fatal error occurs.
    async fn report_loop(&mut self) -> Result<(), Error> {
        loop {
            // DISCOVER
            let ws_path = self.discover().await?;

            // DIAL
            let (mut session, reader) = match Session::dial(&ws_path, DIAL_TIMEOUT).await {
                Ok(pair) => pair,
                Err(err) => {
                    metrics::counter!(METRICS_ID_REPORTER_DIAL_FAILURES).increment(1);
                    tracing::warn!(
                        "stats server unreachable (redial after {:?}): {err}",
                        self.reconnect_delay
                    );
                    sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            metrics::counter!(METRICS_ID_REPORTER_SESSIONS).increment(1);

            // The pong channel lives exactly as long as the session, so a
            // stale pong cannot cross a reconnect.
            let (pong_tx, mut pong_rx) = mpsc::channel(1);
            let mut reader_task = tokio::spawn(read_loop(reader, pong_tx));

            // HANDSHAKE + STEADY
            let result = self
                .run_session(&mut session, &mut pong_rx, &mut reader_task)
                .await;

            // CLOSE
            session.close().await;
            reader_task.abort();
            if let Err(err) = result {
                tracing::warn!(
                    "session ended (reconnect after {:?}): {err}",
                    self.resend_delay
                );
                sleep(self.resend_delay).await;
            }
        }
    }

    /// Polls the node until it reports its identity, then resolves the
    /// shard's stats server.
    ///
    /// A shard without a configured stats server is a configuration error
    /// and aborts the reporter.
    async fn discover(&mut self) -> Result<String, Error> {
        let info = loop {
            match self.rpc.node_info().await {
                Ok(info) => break info,
                Err(err) => {
                    tracing::error!("rpc node_info error: {err}");
                    sleep(DISCOVER_RETRY_DELAY).await;
                }
            }
        };
        self.shard = info.shard;
        self.net_version = info.net_version;
        let base_url = self
            .shards
            .resolve(self.shard)
            .ok_or(Error::UnknownShard(self.shard))?;
        let ws_path = format!("{base_url}{}", self.ws_router);
        tracing::debug!("shard {}, ws path {ws_path}", self.shard);
        Ok(ws_path)
    }

    /// Drives one session from handshake to its first error.
    ///
    /// The reader task handle is polled alongside the tickers: when the
    /// reader terminates for any reason the session is dead, whether or not
    /// the next send would still succeed.
    async fn run_session(
        &mut self,
        session: &mut Session,
        pong_rx: &mut mpsc::Receiver<()>,
        reader_task: &mut JoinHandle<()>,
    ) -> Result<(), Error> {
        // HANDSHAKE: the id of every frame in this session derives from the
        // coinbase fetched here.
        let coinbase = self.coinbase(session).await?;
        self.node_id = format!("{}_{coinbase}", self.hostname);
        self.send_hello(session, pong_rx).await?;

        // STEADY
        let mut full_report = interval_at(
            Instant::now() + self.full_event_interval,
            self.full_event_interval,
        );
        let mut block_report = interval_at(
            Instant::now() + self.block_event_interval,
            self.block_event_interval,
        );
        loop {
            tokio::select! {
                _ = full_report.tick() => {
                    self.report_latency(session, pong_rx).await?;
                    self.report_node_stats(session).await?;
                }
                _ = block_report.tick() => {
                    self.report_current_block(session).await?;
                }
                _ = &mut *reader_task => {
                    return Err(Error::SessionClosed);
                }
            }
        }
    }

    /// Sends the aggregated `hello` frame opening the session.
    #[instrument(level = "debug", skip_all)]
    async fn send_hello(
        &mut self,
        session: &mut Session,
        pong_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), Error> {
        let info = self.node_info_payload(session).await?;
        let block = self.current_block_payload(session).await?;
        let stats = self.node_stats_payload(session).await?;
        let latency = self.measure_latency(session, pong_rx).await?;
        let hello = monitor_types::report::HelloPayload {
            id: self.node_id.clone(),
            info: info.info,
            block: block.block,
            stats: stats.stats,
            latency,
            net_version: self.net_version.clone(),
            shard: self.shard,
        };
        self.send_report(session, ReportTopic::Hello, &hello).await
    }

    /// Measures the one-way latency to the stats server, then reports it.
    async fn report_latency(
        &mut self,
        session: &mut Session,
        pong_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), Error> {
        let latency = self.measure_latency(session, pong_rx).await?;
        let payload = LatencyPayload {
            id: self.node_id.clone(),
            latency,
            net_version: self.net_version.clone(),
            shard: self.shard,
        };
        self.send_report(session, ReportTopic::Latency, &payload)
            .await
    }

    /// Sends a `node-ping` and waits for the reader to deliver the pong.
    ///
    /// At most one measurement is in flight per session; the reporter
    /// guarantees that by serializing all sends on this task. The returned
    /// value is the one-way estimate in milliseconds, one decimal place.
    #[instrument(level = "debug", skip_all)]
    async fn measure_latency(
        &mut self,
        session: &mut Session,
        pong_rx: &mut mpsc::Receiver<()>,
    ) -> Result<String, Error> {
        // a pong from an abandoned probe must not satisfy this one
        while pong_rx.try_recv().is_ok() {}

        let start = Instant::now();
        let client_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_millis() as i64)
            .unwrap_or_default();
        let ping = PingPayload {
            id: self.node_id.clone(),
            client_time,
            net_version: self.net_version.clone(),
            shard: self.shard,
        };
        self.send_report(session, ReportTopic::NodePing, &ping)
            .await?;

        match tokio::time::timeout(PONG_TIMEOUT, pong_rx.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => return Err(Error::SessionClosed),
            Err(_) => {
                metrics::counter!(METRICS_ID_REPORTER_PONG_TIMEOUTS).increment(1);
                return Err(Error::PingTimeout);
            }
        }

        let latency = format_one_way_latency(start.elapsed());
        tracing::debug!("latency is {latency}ms");
        Ok(latency)
    }

    /// Collects and reports the node's liveness statistics.
    async fn report_node_stats(&mut self, session: &mut Session) -> Result<(), Error> {
        let payload = self.node_stats_payload(session).await?;
        self.send_report(session, ReportTopic::Stats, &payload)
            .await
    }

    /// Reports the chain tip, but only when it moved forward.
    ///
    /// The stats server is only interested in progress, so a height at or
    /// below the last reported one suppresses the frame entirely.
    async fn report_current_block(&mut self, session: &mut Session) -> Result<(), Error> {
        let payload = self.current_block_payload(session).await?;
        if self.current_block_height > self.latest_block_height {
            self.latest_block_height = self.current_block_height;
            metrics::gauge!(METRICS_ID_REPORTER_BLOCK_HEIGHT)
                .set(self.latest_block_height as f64);
            self.send_report(session, ReportTopic::Block, &payload)
                .await
        } else {
            tracing::debug!(
                "block {} not past {}, skipping report",
                self.current_block_height,
                self.latest_block_height
            );
            Ok(())
        }
    }

    /// Sends one report frame on the session.
    pub(crate) async fn send_report<T: Serialize>(
        &mut self,
        session: &mut Session,
        topic: ReportTopic,
        payload: &T,
    ) -> Result<(), Error> {
        session.send_json(&ReportFrame::new(topic, payload)).await?;
        metrics::counter!(METRICS_ID_REPORTER_FRAMES_SENT).increment(1);
        Ok(())
    }
}

/// The one-way latency estimate for a measured round trip, in milliseconds
/// with one decimal place.
fn format_one_way_latency(round_trip: Duration) -> String {
    format!("{:.1}", round_trip.as_secs_f64() * 1000.0 / 2.0)
}

/// Spawnable wrapper around [`Reporter::run`].
///
/// Cancels the token when the reporter exits so a fatal configuration error
/// brings the whole daemon down.
pub async fn reporter_task(
    reporter: Reporter,
    cancellation_token: CancellationToken,
) -> Result<(), Error> {
    let guard_token = cancellation_token.clone();
    let _drop_guard = guard_token.drop_guard_ref();

    tracing::info!("start reporting");
    let result = reporter.run(cancellation_token).await;
    match result.as_ref() {
        Ok(_) => tracing::info!("stopped reporter without error"),
        Err(err) => tracing::error!("reporter encountered a fatal error: {err:?}"),
    };
    result
}
