use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nvr_core::{
    catalog::StreamCatalog,
    config::Config,
    database::Database,
    health::HealthMonitor,
    recording::RecordingConsumer,
    relay::{RelayApiClient, RelayController},
    repositories::{SegmentRepository, StreamRepository},
    retention::RetentionSweeper,
    utils::create_circuit_breaker_for_service,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "nvrd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "NVR daemon: Relay supervision, segment recording, and timeline playback")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("nvr_core={},nvrd={}", cli.log_level, cli.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting nvrd v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)?;
    info!(config_file = %cli.config, "configuration loaded");

    let database = Database::new(&config.database, &config).await?;
    database.migrate().await?;
    info!("database connection established and migrations applied");

    let connection = database.connection();
    let stream_repository = StreamRepository::new(connection.clone());
    let segment_repository = SegmentRepository::new(connection.clone());

    let relay_circuit_breaker = create_circuit_breaker_for_service("relay", &config)
        .map_err(|e| anyhow::anyhow!("failed to build relay circuit breaker: {e}"))?;
    let relay_client = Arc::new(RelayApiClient::new(&config.relay, relay_circuit_breaker)?);
    let relay_controller = Arc::new(RelayController::new(config.relay.clone())?);

    info!(port = config.relay.management_port, "starting relay subprocess");
    relay_controller.start(config.relay.management_port).await?;
    let readiness_timeout = relay_controller.readiness_timeout()?;
    relay_controller.wait_ready(readiness_timeout).await?;
    info!("relay subprocess is ready");

    let catalog = Arc::new(StreamCatalog::new(
        stream_repository,
        relay_controller.clone(),
        relay_client.clone(),
    ));
    let outcome = catalog.reload_from_config().await?;
    if !outcome.is_ok() {
        tracing::warn!(failed = ?outcome.failed_names, "some streams failed initial registration, will retry on next health tick");
    }

    let recording_consumer = Arc::new(RecordingConsumer::new(
        catalog.clone(),
        relay_client.clone(),
        segment_repository.clone(),
        config.storage.clone(),
        &config.relay,
        config.health.stream_max_consecutive_failures,
    ));

    let (reconnect_tx, reconnect_rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(recording_consumer.clone().drive_reconnect_signals(reconnect_rx));

    let cancellation = CancellationToken::new();
    let health_monitor = Arc::new(HealthMonitor::new(
        config.health.clone(),
        relay_controller.clone(),
        relay_client.clone(),
        catalog.clone(),
        reconnect_tx,
        cancellation.clone(),
    ));
    tokio::spawn(health_monitor.clone().run());

    let retention_sweeper = Arc::new(RetentionSweeper::new(
        catalog.clone(),
        segment_repository.clone(),
        config.storage.default_segment_max_age_days,
        humantime::parse_duration(&config.storage.storage_cleanup_interval)?,
        cancellation.clone(),
    ));
    tokio::spawn(retention_sweeper.run());

    for entry in catalog.enabled_entries().await {
        recording_consumer.start(&entry.stream.name).await?;
    }
    info!("recording consumers started for all enabled streams");

    use sandboxed_file_manager::{CleanupPolicy, TimeMatch};
    let manifest_scratch = sandboxed_file_manager::SandboxedManager::builder()
        .base_directory(config.storage.manifest_scratch_path.clone())
        .cleanup_policy(
            CleanupPolicy::new()
                .remove_after(humantime::parse_duration(&config.storage.manifest_scratch_retention)?)
                .time_match(TimeMatch::Modified),
        )
        .cleanup_interval(humantime::parse_duration(&config.storage.storage_cleanup_interval)?)
        .build()
        .await?;

    let web_server = WebServer::new(
        config,
        database,
        catalog,
        segment_repository,
        relay_client,
        relay_controller.clone(),
        recording_consumer,
        health_monitor.clone(),
        manifest_scratch,
    )
    .await?;

    info!("starting web server on {}:{}", web_server.host(), web_server.port());

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("web server failed: {e}");
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("web server is listening"),
        Ok(Err(bind_error)) => {
            tracing::error!("failed to bind web server: {bind_error}");
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("web server task completed without signaling");
            return Err(anyhow::anyhow!("web server failed to start"));
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cancellation.cancel();
    for entry in catalog.enabled_entries().await {
        let _ = recording_consumer.stop(&entry.stream.name).await;
    }
    let _ = relay_controller.stop().await;
    server_handle.abort();

    Ok(())
}
