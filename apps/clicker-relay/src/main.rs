use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing::info;

use clicker_relay::cli::{run_send_client, Cli, Commands};
use clicker_relay::config::ServerConfig;
use clicker_relay::telemetry::Telemetry;
use clicker_relay::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Send {
        url,
        roku_ip,
        action,
        key,
    }) = cli.command
    {
        // The one-shot client logs through plain fmt; the Prometheus
        // recorder is only installed for the server.
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "info");
        }
        tracing_subscriber::fmt::init();
        return run_send_client(url, roku_ip, action, key).await;
    }

    let telemetry = Telemetry::init()?;
    let config = ServerConfig::try_from(cli)?;
    info!(
        listen_addr = %config.listen_addr,
        roku_ip = config.roku_ip.as_deref().unwrap_or("unset"),
        ecp_port = config.ecp_port,
        "starting clicker relay"
    );

    run(config, telemetry.metrics_handle()).await
}

async fn run(config: ServerConfig, metrics: PrometheusHandle) -> Result<()> {
    let state = AppState::new(&config, metrics)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("listening on {}", config.listen_addr);

    // Connect-info service so handlers can identify controllers by address.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server shutdown with error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
