//! Swap Agent - swap space and paging statistics exporter
//!
//! Reads swap usage and paging activity from the host on a fixed interval
//! and serves them, with the agent's own health and metrics, over HTTP.
//! `--oneshot` runs a single cycle and prints the families as JSON lines.

use anyhow::{Context, Result};
use std::sync::Arc;
use swap_agent::{api, config::AgentConfig};
use swap_lib::{
    collector::{CollectionLoopBuilder, PlatformReader, RawReader},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    sink::{JsonSink, PrometheusSink},
    SwapConfig, SwapPlugin,
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --oneshot output stays clean JSON lines
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let oneshot = std::env::args().skip(1).any(|arg| arg == "--oneshot");

    let config = AgentConfig::load().context("Failed to load agent configuration")?;
    let swap_config = SwapConfig::load(config.swap_config.as_deref(), PlatformReader::CAPABILITIES)
        .context("Failed to load swap configuration")?;
    info!(
        node_name = %config.node_name,
        backend = PlatformReader::NAME,
        ?swap_config,
        "Agent configured"
    );

    let mut plugin = SwapPlugin::<PlatformReader>::init(swap_config)
        .context("Failed to initialize swap plugin")?;

    if oneshot {
        let mut sink = JsonSink::new(std::io::stdout().lock());
        let report = plugin.read(&mut sink)?;
        info!(
            readings = report.readings,
            dispatched = report.dispatched,
            "One-shot collection complete"
        );
        return Ok(());
    }

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::EXPORTER).await;

    let logger = StructuredLogger::new(&config.node_name);

    let sink = PrometheusSink::register_default().context("Failed to register swap collector")?;
    let collection_loop = CollectionLoopBuilder::new()
        .plugin(plugin)
        .sink(sink)
        .interval(config.collection_interval())
        .unhealthy_after(config.unhealthy_after_failures)
        .health(health_registry.clone())
        .node_name(&config.node_name)
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    health_registry.set_ready(true).await;
    logger.log_startup(
        AGENT_VERSION,
        PlatformReader::NAME,
        config.collection_interval_secs,
    );

    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = &mut api_handle => {
            let reason = match served {
                Ok(Ok(())) => "API server stopped".to_string(),
                Ok(Err(e)) => format!("API server failed: {e}"),
                Err(e) => format!("API server task panicked: {e}"),
            };
            error!(reason = %reason, "Stopping agent");
            logger.log_shutdown(&reason);
        }
    }

    let _ = shutdown_tx.send(());
    loop_handle.await?;
    api_handle.abort();
    info!("Shutdown complete");

    Ok(())
}
