use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::config::parse_interval_ms;
use crate::error::AppError;
use crate::simulation::{PriceTick, ResetAck, SimulationProgress};
use crate::storage::{CandleRecord, CandleSource};

pub const MAX_CANDLES_LIMIT: u32 = 1000;

// ── Query params ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// Fill blanks from the configured defaults and validate the interval.
fn resolve_key(
    state: &AppState,
    symbol: Option<String>,
    interval: Option<String>,
) -> Result<(String, String), ApiError> {
    let symbol = symbol
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_symbol.clone());
    let interval = interval
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_interval.clone());
    parse_interval_ms(&interval).map_err(|e| ApiError::bad_request(format!("{e:#}")))?;
    Ok((symbol, interval))
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError(AppError::Io(std::io::Error::other(e)))
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CandleResponse {
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<CandleRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub price: f64,
    pub timestamp: String,
    pub simulation_progress: SimulationProgress,
}

impl From<PriceTick> for PriceResponse {
    fn from(tick: PriceTick) -> Self {
        Self {
            symbol: tick.symbol,
            price: tick.price,
            timestamp: tick.timestamp,
            simulation_progress: tick.simulation_progress,
        }
    }
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/candles", get(get_candles))
        .route("/price", get(get_current_price))
        .route("/reset-simulation", post(reset_simulation))
}

async fn get_candles(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CandlesQuery>,
) -> Result<Json<CandleResponse>, ApiError> {
    if q.limit == 0 || q.limit > MAX_CANDLES_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}, got {}",
            MAX_CANDLES_LIMIT, q.limit
        )));
    }
    let (symbol, interval) = resolve_key(&state, q.symbol, q.interval)?;

    let store = state.candles.clone();
    let (sym, iv) = (symbol.clone(), interval.clone());
    let candles = tokio::task::spawn_blocking(move || store.load_candles(&sym, &iv))
        .await
        .map_err(join_error)??
        .unwrap_or_default();
    let skip = candles.len().saturating_sub(q.limit as usize);
    let candles = candles[skip..].iter().map(CandleRecord::from).collect();

    Ok(Json(CandleResponse {
        symbol,
        interval,
        candles,
    }))
}

async fn get_current_price(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MarketQuery>,
) -> Result<Json<PriceResponse>, ApiError> {
    let (symbol, interval) = resolve_key(&state, q.symbol, q.interval)?;
    // Candle loading and state saves are blocking file I/O.
    let tick = tokio::task::spawn_blocking(move || {
        let mut engine = state.engine.blocking_lock();
        engine.get_current_price(&symbol, &interval)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(PriceResponse::from(tick)))
}

async fn reset_simulation(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MarketQuery>,
) -> Result<Json<ResetAck>, ApiError> {
    let (symbol, interval) = resolve_key(&state, q.symbol, q.interval)?;
    let ack = tokio::task::spawn_blocking(move || {
        let mut engine = state.engine.blocking_lock();
        engine.reset_simulation(&symbol, &interval)
    })
    .await
    .map_err(join_error)?;
    Ok(Json(ack))
}
