//! Configuration and CLI/environment parsing for the monitoring daemon.
//!
//! Every option is available as a long flag and as a `MONITOR_*` environment
//! variable. A handful of invariants cannot be expressed through `clap`;
//! [`MonitorConfig::validate`] checks those and the binary treats a failure
//! as fatal.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// The run mode of the daemon.
///
/// Selects the default logging profile; individual options still win through
/// their own flags and environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Development profile, verbose logging.
    Dev,
    /// Production profile.
    Prod,
}

impl RunMode {
    /// The default log filter of the mode.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            RunMode::Dev => "seele_monitor_api=debug,seele_monitor_reporter=debug,info",
            RunMode::Prod => "info",
        }
    }
}

/// The configuration of the monitoring daemon.
///
/// It can be configured via environment variables or command line arguments
/// using `clap`.
#[derive(Parser, Debug)]
#[command(name = "monitor-api", version, about = "Seele node telemetry reporting daemon")]
pub struct MonitorConfig {
    /// Run mode selecting the logging profile.
    #[clap(long, env = "MONITOR_RUNMODE", value_enum, default_value = "dev")]
    pub run_mode: RunMode,

    /// Explicit log filter, overriding the run-mode default.
    ///
    /// `RUST_LOG` wins over both when set.
    #[clap(long, env = "MONITOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Name this daemon reports to the stats server.
    #[clap(long, env = "MONITOR_APP_NAME", default_value = "seele-monitor-api")]
    pub app_name: String,

    /// Address the inbound HTTP/websocket server binds to.
    #[clap(long, env = "MONITOR_ADDR", default_value = "0.0.0.0:9999")]
    pub addr: SocketAddr,

    /// Deadline for a single inbound HTTP request.
    #[clap(
        long,
        env = "MONITOR_REQUEST_TIMEOUT",
        default_value = "120s",
        value_parser = humantime::parse_duration
    )]
    pub request_timeout: Duration,

    /// Max concurrent inbound requests; 0 disables the limit.
    #[clap(long, env = "MONITOR_CONNECTION_LIMIT", default_value = "0")]
    pub connection_limit: usize,

    /// Path of the inbound websocket endpoint.
    ///
    /// Doubles as the routing suffix appended to the shard's stats-server
    /// base URL for the outbound session.
    #[clap(long, env = "MONITOR_WS_ROUTER", default_value = "/api")]
    pub ws_router: String,

    /// `host:port` the daemon advertises to the stats server.
    ///
    /// Only the port is reported today; the bind address is the fallback.
    #[clap(long, env = "MONITOR_STATS_URL")]
    pub stats_url: Option<String>,

    /// Shard to stats-server mapping as comma separated `shard=base_url`
    /// pairs, e.g. `1=stats-1.seele.pro:443,2=stats-2.seele.pro:443`.
    #[clap(
        long,
        env = "MONITOR_SHARD_MAP",
        value_delimiter = ',',
        value_parser = parse_shard_entry
    )]
    pub shard_map: Vec<(u32, String)>,

    /// Cadence of the full report (latency + stats).
    #[clap(
        long,
        env = "MONITOR_FULL_EVENT_INTERVAL",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub full_event_interval: Duration,

    /// Cadence of the chain-tip report.
    #[clap(
        long,
        env = "MONITOR_BLOCK_EVENT_INTERVAL",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub block_event_interval: Duration,

    /// Backoff after the stats server was unreachable.
    #[clap(
        long,
        env = "MONITOR_RECONNECT_DELAY",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub reconnect_delay: Duration,

    /// Backoff after a session or handshake error.
    #[clap(
        long,
        env = "MONITOR_RESEND_DELAY",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub resend_delay: Duration,

    /// Consecutive collector failures before the node is reported inactive.
    #[clap(long, env = "MONITOR_REPORT_ERROR_AFTER", default_value = "10")]
    pub report_error_after: u32,

    /// Serve the inbound websocket endpoint and run the stats reporter.
    #[clap(long, env = "MONITOR_ENABLE_WEBSOCKET")]
    pub enable_websocket: bool,

    /// Allow JSON-RPC calls to the local node.
    #[clap(long, env = "MONITOR_ENABLE_RPC")]
    pub enable_rpc: bool,

    /// `host:port` of the node's JSON-RPC interface.
    #[clap(long, env = "MONITOR_RPC_URL", default_value = "127.0.0.1:8027")]
    pub rpc_url: String,

    /// Transport scheme of the node's JSON-RPC interface.
    ///
    /// Only `tcp` is supported; anything else is a configuration error.
    #[clap(long, env = "MONITOR_RPC_SCHEME", default_value = "tcp")]
    pub rpc_scheme: String,

    /// Grace period for background tasks on shutdown.
    #[clap(
        long,
        env = "MONITOR_SHUTDOWN_GRACE",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub shutdown_grace: Duration,
}

impl MonitorConfig {
    /// Checks the cross-option invariants `clap` cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.rpc_scheme != "tcp" {
            eyre::bail!("unsupported rpc scheme: {}", self.rpc_scheme);
        }
        if self.enable_websocket && !self.enable_rpc {
            eyre::bail!("websocket reporting requires --enable-rpc");
        }
        if !self.ws_router.starts_with('/') {
            eyre::bail!("ws router must start with '/': {}", self.ws_router);
        }
        Ok(())
    }

    /// The port advertised as `nodeInfo.port`: taken from the stats-url
    /// override when present, from the bind address otherwise.
    pub fn advertised_port(&self) -> eyre::Result<u16> {
        match &self.stats_url {
            Some(url) => {
                let (_, port) = url.rsplit_once(':').ok_or_else(|| {
                    eyre::eyre!("invalid stats url \"{url}\", should be host:port")
                })?;
                Ok(port.parse()?)
            }
            None => Ok(self.addr.port()),
        }
    }

    /// The effective log filter: the explicit log level when configured, the
    /// run-mode default otherwise.
    pub fn log_filter(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| self.run_mode.default_log_filter())
    }
}

/// Parses one `shard=base_url` pair of the shard map.
fn parse_shard_entry(entry: &str) -> Result<(u32, String), String> {
    let (shard, url) = entry
        .split_once('=')
        .ok_or_else(|| format!("expected shard=url, got \"{entry}\""))?;
    let shard = shard
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid shard \"{shard}\": {err}"))?;
    Ok((shard, url.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn shard_map_parses_pairs() {
        let config = MonitorConfig::try_parse_from([
            "monitor-api",
            "--shard-map",
            "1=stats-1.seele.pro:443,2=stats-2.seele.pro:443",
        ])
        .expect("parses");
        assert_eq!(
            config.shard_map,
            vec![
                (1, "stats-1.seele.pro:443".to_owned()),
                (2, "stats-2.seele.pro:443".to_owned())
            ]
        );
    }

    #[test]
    fn bad_shard_entries_are_rejected() {
        assert!(parse_shard_entry("no-separator").is_err());
        assert!(parse_shard_entry("x=url").is_err());
        assert_eq!(
            parse_shard_entry(" 3 = stats.seele.pro:443 "),
            Ok((3, "stats.seele.pro:443".to_owned()))
        );
    }

    #[test]
    fn websocket_without_rpc_is_a_config_error() {
        let config =
            MonitorConfig::try_parse_from(["monitor-api", "--enable-websocket"]).expect("parses");
        assert!(config.validate().is_err());

        let config = MonitorConfig::try_parse_from([
            "monitor-api",
            "--enable-websocket",
            "--enable-rpc",
        ])
        .expect("parses");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn only_tcp_rpc_is_supported() {
        let config = MonitorConfig::try_parse_from(["monitor-api", "--rpc-scheme", "unix"])
            .expect("parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn advertised_port_prefers_the_stats_url() {
        let config = MonitorConfig::try_parse_from([
            "monitor-api",
            "--stats-url",
            "stats.seele.pro:8057",
        ])
        .expect("parses");
        assert_eq!(config.advertised_port().expect("valid"), 8057);

        let config = MonitorConfig::try_parse_from(["monitor-api"]).expect("parses");
        assert_eq!(config.advertised_port().expect("valid"), 9999);

        let config = MonitorConfig::try_parse_from(["monitor-api", "--stats-url", "no-port"])
            .expect("parses");
        assert!(config.advertised_port().is_err());
    }
}
