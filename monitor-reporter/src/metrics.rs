//! Metrics definitions for the reporting daemon.
//!
//! This module defines all metrics keys used by the reporter and provides a
//! helper [`describe_metrics`] to set metadata for each metric using the
//! `metrics` crate.

/// Metrics key for counting established stats-server sessions.
pub const METRICS_ID_REPORTER_SESSIONS: &str = "seele.monitor.reporter.sessions";
/// Metrics key for counting failed dial rounds.
pub const METRICS_ID_REPORTER_DIAL_FAILURES: &str = "seele.monitor.reporter.dial.failures";
/// Metrics key for counting frames pushed to the stats server.
pub const METRICS_ID_REPORTER_FRAMES_SENT: &str = "seele.monitor.reporter.frames.sent";
/// Metrics key for counting collector failures.
pub const METRICS_ID_REPORTER_COLLECT_ERRORS: &str = "seele.monitor.reporter.collect.errors";
/// Metrics key for counting synthetic degraded reports.
pub const METRICS_ID_REPORTER_DEGRADED_REPORTS: &str = "seele.monitor.reporter.degraded.reports";
/// Metrics key for counting latency probes that timed out.
pub const METRICS_ID_REPORTER_PONG_TIMEOUTS: &str = "seele.monitor.reporter.pong.timeouts";
/// Metrics key for the highest block height reported so far.
pub const METRICS_ID_REPORTER_BLOCK_HEIGHT: &str = "seele.monitor.reporter.block.height";

/// Describe all metrics used by the reporter.
///
/// This calls the `describe_*` functions from the `metrics` crate to set
/// metadata on the different metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(
        METRICS_ID_REPORTER_SESSIONS,
        metrics::Unit::Count,
        "Number of established stats-server sessions"
    );

    metrics::describe_counter!(
        METRICS_ID_REPORTER_DIAL_FAILURES,
        metrics::Unit::Count,
        "Number of dial rounds where no stats-server URL was reachable"
    );

    metrics::describe_counter!(
        METRICS_ID_REPORTER_FRAMES_SENT,
        metrics::Unit::Count,
        "Number of frames pushed to the stats server"
    );

    metrics::describe_counter!(
        METRICS_ID_REPORTER_COLLECT_ERRORS,
        metrics::Unit::Count,
        "Number of collector failures against the node RPC"
    );

    metrics::describe_counter!(
        METRICS_ID_REPORTER_DEGRADED_REPORTS,
        metrics::Unit::Count,
        "Number of synthetic degraded stats frames emitted"
    );

    metrics::describe_counter!(
        METRICS_ID_REPORTER_PONG_TIMEOUTS,
        metrics::Unit::Count,
        "Number of latency probes the stats server never answered"
    );

    metrics::describe_gauge!(
        METRICS_ID_REPORTER_BLOCK_HEIGHT,
        metrics::Unit::Count,
        "Highest block height reported in this process lifetime"
    );
}
