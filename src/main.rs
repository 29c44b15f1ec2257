use std::net::SocketAddr;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use candle_sim::api::{self, AppState};
use candle_sim::config::Config;
use candle_sim::logging::init_tracing;
use candle_sim::simulation::{JsonFileStateStore, SimulationEngine};
use candle_sim::storage::CsvCandleStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set CANDLE_SIM_CONFIG or run from a directory containing config/default.toml");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging)?;

    let candles = CsvCandleStore::new(&config.simulation.data_dir);
    let store = JsonFileStateStore::new(config.simulation.state_path());
    tracing::info!(
        data_dir = %config.simulation.data_dir.display(),
        state_file = %store.path().display(),
        points_per_candle = config.simulation.points_per_candle,
        "Starting candle-sim API"
    );

    let engine = SimulationEngine::new(
        candles.clone(),
        store,
        StdRng::from_entropy(),
        config.simulation.engine_options(),
    )?;
    let app = api::router(AppState::new(engine, candles));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid server bind address {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown signal received, stopping server");
}
