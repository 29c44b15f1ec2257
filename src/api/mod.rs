//! HTTP access layer over the simulation engine and the candle files.

pub mod error;
pub mod market;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use rand::rngs::StdRng;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::simulation::{JsonFileStateStore, SimulationEngine};
use crate::storage::CsvCandleStore;

pub use error::ApiError;

pub const API_NAME: &str = "candle-sim";
pub const API_DESCRIPTION: &str =
    "Replays recorded candles as a synthesized intra-candle price feed for strategy testing";

pub type Engine = SimulationEngine<CsvCandleStore, JsonFileStateStore, StdRng>;

/// Shared state handed to every handler.
///
/// The engine sits behind one async mutex so concurrent requests for the same
/// key advance its cursor one at a time.
pub struct AppState {
    pub engine: Mutex<Engine>,
    pub candles: CsvCandleStore,
    pub default_symbol: String,
    pub default_interval: String,
}

impl AppState {
    pub fn new(engine: Engine, candles: CsvCandleStore) -> Arc<Self> {
        let default_symbol = engine.options().default_symbol.clone();
        let default_interval = engine.options().default_interval.clone();
        Arc::new(Self {
            engine: Mutex::new(engine),
            candles,
            default_symbol,
            default_interval,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/market", market::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": API_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": API_DESCRIPTION,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
