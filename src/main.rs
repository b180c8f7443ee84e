// ABOUTME: Main entry point for the parley dispatch service.
// ABOUTME: Initializes logging, config, store, queue broker, coordinator, monitor, and HTTP server.

use anyhow::{Context, Result};
use parley::{
    config::Config,
    routes::{router, AppState},
};
use parley_core::{
    monitor::{run_monitor, SessionMonitor},
    queue::memory::{BrokerConfig, MemoryBroker},
    seed::seed_agents,
    Coordinator, QueueTransport, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting parley");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        workspace = %config.workspace.path,
        monitor_interval_secs = config.dispatch.monitor_interval_secs,
        "Configuration loaded"
    );

    // Initialize store and seed the agent roster
    let store = Arc::new(Store::new(&config.workspace.path)?);
    seed_agents(&store)?;

    // Queue broker with an explicit redelivery cadence
    let transport: Arc<dyn QueueTransport> = Arc::new(MemoryBroker::new(BrokerConfig {
        redelivery_delay: Duration::from_millis(config.dispatch.redelivery_delay_ms),
    }));

    // Dispatch coordinator owns the session queue consumer
    let coordinator = Arc::new(Coordinator::new(Arc::clone(&store), transport));
    coordinator.start().await?;

    // Idle-session monitor sweeps on a fixed cadence
    let monitor = SessionMonitor::new(
        Arc::clone(&store),
        config.dispatch.missed_poll_threshold,
    );
    tokio::spawn(run_monitor(
        monitor,
        Duration::from_secs(config.dispatch.monitor_interval_secs),
    ));

    // HTTP server
    let app = router(AppState { coordinator });
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
