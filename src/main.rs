//! Depth heatmap
//!
//! Replicates one symbol's Binance order book and redraws it as a heatmap on a
//! fixed interval.

use prometheus::Registry;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depth_heatmap::{
    health, AppState, Config, FeedCounters, FeedManager, Publisher, RenderLoop, ReplicaGuard,
    RestSnapshotClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, the heatmap owns stdout
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting depth heatmap");

    let config = Arc::new(Config::load()?);
    info!(
        symbol = %config.symbol,
        step = %config.band.step,
        range = ?config.band.range,
        "Configuration loaded"
    );

    let guard = Arc::new(ReplicaGuard::new());

    let registry = Registry::new();
    let counters = FeedCounters::new()?;
    counters.register(&registry)?;

    let publisher = match &config.ipc_socket_path {
        Some(path) => Some(Arc::new(Publisher::new(path).await?)),
        None => None,
    };

    let state = Arc::new(AppState {
        guard: guard.clone(),
        config: config.clone(),
        counters: counters.clone(),
        registry,
    });

    tokio::spawn(async move {
        if let Err(e) = health::serve(state).await {
            warn!(error = %e, "Health server error");
        }
    });

    let renderer = RenderLoop::new(config.clone(), guard.clone(), publisher);
    tokio::spawn(async move {
        if let Err(e) = renderer.run().await {
            warn!(error = %e, "Render loop stopped");
        }
    });

    let source = RestSnapshotClient::new(&config.rest_endpoint)?;
    let mut feed = FeedManager::new(config, guard, counters, source);

    tokio::select! {
        result = feed.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
