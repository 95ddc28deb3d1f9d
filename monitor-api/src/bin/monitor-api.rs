//! Seele Monitor Daemon Binary
//!
//! This is the main entry point for the telemetry reporting daemon. It
//! initializes tracing, parses the configuration from command-line arguments
//! or environment variables, spawns the stats reporter and serves the
//! inbound endpoints until a shutdown signal arrives.

use std::process::ExitCode;

use clap::Parser as _;
use eyre::Context as _;
use monitor_reporter::rpc::NodeRpc;
use monitor_reporter::shards::ShardDirectory;
use monitor_reporter::{Reporter, ReporterArgs, instance_hostname, reporter_task};
use seele_monitor_api::config::MonitorConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("can install");

    let config = MonitorConfig::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    monitor_reporter::metrics::describe_metrics();

    tracing::info!(
        "starting {} v{} with config: {config:#?}",
        config.app_name,
        env!("CARGO_PKG_VERSION")
    );
    config.validate()?;

    let cancellation_token = CancellationToken::new();
    tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("received shutdown signal"),
                Err(err) => tracing::error!("could not listen for shutdown signal: {err}"),
            }
            cancellation_token.cancel();
        }
    });

    let hostname = instance_hostname();

    let reporter_handle = if config.enable_websocket {
        let reporter = Reporter::new(ReporterArgs {
            rpc: NodeRpc::new(&config.rpc_url),
            shards: ShardDirectory::from_iter(config.shard_map.iter().cloned()),
            app_name: config.app_name.clone(),
            advertised_port: config.advertised_port()?,
            ws_router: config.ws_router.clone(),
            full_event_interval: config.full_event_interval,
            block_event_interval: config.block_event_interval,
            reconnect_delay: config.reconnect_delay,
            resend_delay: config.resend_delay,
            report_error_after: config.report_error_after,
        });
        Some(tokio::spawn(reporter_task(
            reporter,
            cancellation_token.clone(),
        )))
    } else {
        tracing::warn!("websocket reporting disabled, serving plain endpoints only");
        None
    };

    let endpoint_id = format!("{hostname}_{}", config.addr);
    let router = seele_monitor_api::router(&config, endpoint_id);

    tracing::info!("binding to {}", config.addr);
    let tcp_listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .context("while binding tcp-listener")?;

    let axum_cancel_token = cancellation_token.clone();
    let server = tokio::spawn(async move {
        tracing::info!(
            "starting axum server on {}",
            tcp_listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or(String::from("invalid addr"))
        );
        let axum_shutdown_signal = axum_cancel_token.clone();
        let axum_result = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move { axum_shutdown_signal.cancelled().await })
            .await;
        tracing::info!("axum server shutdown");
        if let Err(err) = axum_result {
            tracing::error!("got error from axum: {err:?}");
        }
        // cancel in case axum encountered an error, to shut the daemon down
        axum_cancel_token.cancel();
    });

    tracing::info!("everything started successfully - now waiting for shutdown...");
    cancellation_token.cancelled().await;

    let shutdown_grace = config.shutdown_grace;
    tracing::info!("waiting for shutdown of services (max wait time {shutdown_grace:?})..");

    let mut exit_code = ExitCode::SUCCESS;
    let shutdown = async {
        let _ = server.await;
        match reporter_handle {
            Some(handle) => match handle.await {
                Ok(Ok(())) => true,
                // the fatal error was already logged by the reporter task
                Ok(Err(_)) => false,
                Err(err) => {
                    tracing::error!("could not join reporter: {err:?}");
                    false
                }
            },
            None => true,
        }
    };
    match tokio::time::timeout(shutdown_grace, shutdown).await {
        Ok(true) => tracing::info!("successfully finished shutdown in time"),
        Ok(false) => exit_code = ExitCode::FAILURE,
        Err(_) => {
            tracing::warn!("could not finish shutdown in time");
            exit_code = ExitCode::FAILURE;
        }
    }

    tracing::info!("good night!");
    Ok(exit_code)
}
