use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::path::{generate_price_path, DEFAULT_POINTS_PER_CANDLE, MIN_POINTS_PER_CANDLE};
use super::state::{
    SimKey, SimulationCursor, SimulationState, StateStore, DEFAULT_INTERVAL, DEFAULT_SYMBOL,
};
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::storage::CandleSource;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub points_per_candle: usize,
    pub default_symbol: String,
    pub default_interval: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            points_per_candle: DEFAULT_POINTS_PER_CANDLE,
            default_symbol: DEFAULT_SYMBOL.to_string(),
            default_interval: DEFAULT_INTERVAL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub candle_index: usize,
    pub point_index: usize,
    pub total_candles: usize,
    pub total_points: usize,
    pub high_touched: bool,
    pub low_touched: bool,
}

/// The point returned by one `get_current_price` call plus where it sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub interval: String,
    pub price: f64,
    pub timestamp: String,
    pub candle_timestamp: String,
    pub candle_close_timestamp: String,
    pub is_open: bool,
    pub is_high: bool,
    pub is_low: bool,
    pub is_close: bool,
    pub simulation_progress: SimulationProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetAck {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

/// Replays candle history as a stream of synthesized intra-candle prices.
///
/// Each `(symbol, interval)` key owns a [`SimulationCursor`]. A call returns
/// exactly one point, generating a fresh path whenever the current candle has
/// none or has been fully consumed, and wrapping to the first candle after the
/// last. State is saved after every mutation; store failures are logged and
/// the engine keeps going from memory.
///
/// The engine takes `&mut self` and does no locking of its own. Callers that
/// share it across tasks must serialize access.
pub struct SimulationEngine<C, S, R> {
    source: C,
    store: S,
    rng: R,
    options: EngineOptions,
    state: SimulationState,
    candles: HashMap<SimKey, Vec<Candle>>,
}

impl<C, S, R> SimulationEngine<C, S, R>
where
    C: CandleSource,
    S: StateStore,
    R: Rng,
{
    pub fn new(source: C, store: S, rng: R, options: EngineOptions) -> Result<Self, AppError> {
        if options.points_per_candle < MIN_POINTS_PER_CANDLE {
            return Err(AppError::InvalidArgument(format!(
                "points_per_candle must be >= {}, got {}",
                MIN_POINTS_PER_CANDLE, options.points_per_candle
            )));
        }

        let state = match store.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    keys = state.progress.len(),
                    current_symbol = %state.current_symbol,
                    current_interval = %state.current_interval,
                    "Loaded simulation state"
                );
                state
            }
            Ok(None) => {
                let state = SimulationState::with_defaults(
                    &options.default_symbol,
                    &options.default_interval,
                );
                if let Err(e) = store.save(&state) {
                    tracing::warn!(error = %e, "Failed to persist default simulation state");
                }
                state
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load simulation state, starting from default");
                SimulationState::with_defaults(&options.default_symbol, &options.default_interval)
            }
        };

        Ok(Self {
            source,
            store,
            rng,
            options,
            state,
            candles: HashMap::new(),
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cursor(&self, symbol: &str, interval: &str) -> Option<&SimulationCursor> {
        self.state.cursor(&SimKey::new(symbol, interval))
    }

    /// Return the next simulated price for the key and advance its cursor.
    pub fn get_current_price(&mut self, symbol: &str, interval: &str) -> Result<PriceTick, AppError> {
        let key = SimKey::new(symbol, interval);
        let candles = cached_candles(&mut self.candles, &self.source, &key)?;
        let total_candles = candles.len();
        let points_per_candle = self.options.points_per_candle;

        let cursor = self
            .state
            .progress
            .entry(key.storage_key())
            .or_insert_with(|| {
                tracing::info!(
                    symbol = %key.symbol,
                    interval = %key.interval,
                    total_candles,
                    "Initialized simulation cursor"
                );
                SimulationCursor::new(total_candles)
            });

        if cursor.total_candles != total_candles {
            tracing::info!(
                symbol = %key.symbol,
                interval = %key.interval,
                persisted = cursor.total_candles,
                loaded = total_candles,
                "Candle count changed since cursor was saved"
            );
            cursor.total_candles = total_candles;
        }
        if cursor.candle_index >= total_candles {
            cursor.candle_index = 0;
            cursor.clear_points();
        }

        if cursor.current_price_points.is_empty() {
            cursor.current_price_points =
                generate_price_path(&candles[cursor.candle_index], points_per_candle, &mut self.rng)?;
            cursor.point_index = 0;
        }

        if cursor.is_exhausted() {
            cursor.candle_index += 1;
            if cursor.candle_index >= total_candles {
                tracing::info!(
                    symbol = %key.symbol,
                    interval = %key.interval,
                    total_candles,
                    "Reached end of candle history, wrapping to first candle"
                );
                cursor.candle_index = 0;
            }
            cursor.clear_points();
            cursor.current_price_points =
                generate_price_path(&candles[cursor.candle_index], points_per_candle, &mut self.rng)?;
        }

        let point_index = cursor.point_index;
        let point = cursor.current_price_points[point_index].clone();
        let anchor = point.is_anchor();
        if point.is_high {
            cursor.high_touched = true;
        }
        if point.is_low {
            cursor.low_touched = true;
        }
        cursor.point_index += 1;

        let candle = &candles[cursor.candle_index];
        let tick = PriceTick {
            symbol: key.symbol.clone(),
            interval: key.interval.clone(),
            price: point.price,
            timestamp: point.timestamp,
            candle_timestamp: candle.open_timestamp(),
            candle_close_timestamp: candle.close_timestamp(),
            is_open: point.is_open,
            is_high: point.is_high,
            is_low: point.is_low,
            is_close: point.is_close,
            simulation_progress: SimulationProgress {
                candle_index: cursor.candle_index,
                point_index,
                total_candles,
                total_points: cursor.current_price_points.len(),
                high_touched: cursor.high_touched,
                low_touched: cursor.low_touched,
            },
        };

        self.state.mark_current(&key);
        self.persist();
        tracing::debug!(
            symbol = %tick.symbol,
            interval = %tick.interval,
            price = tick.price,
            candle_index = tick.simulation_progress.candle_index,
            point_index = tick.simulation_progress.point_index,
            anchor,
            "Served simulated price"
        );
        Ok(tick)
    }

    /// Drop all progress for the key. Candle data is left untouched.
    pub fn reset_simulation(&mut self, symbol: &str, interval: &str) -> ResetAck {
        let key = SimKey::new(symbol, interval);
        self.state.progress.remove(&key.storage_key());
        self.state.mark_current(&key);
        self.persist();

        tracing::info!(symbol = %key.symbol, interval = %key.interval, "Reset simulation");
        ResetAck {
            status: "success".to_string(),
            message: format!(
                "Simulation reset for {} at {} interval",
                key.symbol, key.interval
            ),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn persist(&mut self) {
        self.state.updated_at = Some(chrono::Utc::now().to_rfc3339());
        if let Err(e) = self.store.save(&self.state) {
            tracing::warn!(error = %e, "Failed to persist simulation state");
        }
    }
}

fn cached_candles<'a, C: CandleSource>(
    cache: &'a mut HashMap<SimKey, Vec<Candle>>,
    source: &C,
    key: &SimKey,
) -> Result<&'a [Candle], AppError> {
    if !cache.contains_key(key) {
        let candles = match source.load_candles(&key.symbol, &key.interval)? {
            Some(candles) if !candles.is_empty() => candles,
            _ => return Err(AppError::not_found(&key.symbol, &key.interval)),
        };
        for (index, candle) in candles.iter().enumerate() {
            if let Err(e) = candle.validate() {
                tracing::warn!(
                    symbol = %key.symbol,
                    interval = %key.interval,
                    index,
                    error = %e,
                    "Candle violates OHLC bounds"
                );
            }
        }
        cache.insert(key.clone(), candles);
    }
    cache
        .get(key)
        .map(Vec::as_slice)
        .ok_or_else(|| AppError::not_found(&key.symbol, &key.interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::state::MemoryStateStore;
    use crate::storage::MemoryCandleSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine_with(
        candles: Vec<Candle>,
        points: usize,
    ) -> SimulationEngine<MemoryCandleSource, MemoryStateStore, StdRng> {
        let source = MemoryCandleSource::new().with_candles("AVAXUSDT", "1h", candles);
        SimulationEngine::new(
            source,
            MemoryStateStore::new(),
            StdRng::seed_from_u64(5),
            EngineOptions {
                points_per_candle: points,
                ..EngineOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn rejects_too_few_points_per_candle() {
        let result = SimulationEngine::new(
            MemoryCandleSource::new(),
            MemoryStateStore::new(),
            StdRng::seed_from_u64(1),
            EngineOptions {
                points_per_candle: 3,
                ..EngineOptions::default()
            },
        );
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn first_run_persists_default_state() {
        let engine = engine_with(Vec::new(), 4);
        let saved = engine.store().snapshot().expect("default state saved");
        assert_eq!(saved.current_symbol, DEFAULT_SYMBOL);
        assert!(saved.progress.is_empty());
    }

    #[test]
    fn empty_history_is_not_found() {
        let mut engine = engine_with(Vec::new(), 4);
        assert!(matches!(
            engine.get_current_price("AVAXUSDT", "1h"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn reported_point_index_is_the_returned_point() {
        let mut engine = engine_with(vec![Candle::from_ohlc(0, 60_000, 1.0, 2.0, 0.5, 1.5)], 4);
        let first = engine.get_current_price("AVAXUSDT", "1h").unwrap();
        assert!(first.is_open);
        assert_eq!(first.simulation_progress.point_index, 0);
        assert_eq!(engine.cursor("AVAXUSDT", "1h").unwrap().point_index, 1);
    }

    #[test]
    fn shrunk_history_wraps_stale_cursor() {
        let mut state = SimulationState::default();
        state.progress.insert(
            "AVAXUSDT_1h".to_string(),
            SimulationCursor {
                candle_index: 7,
                point_index: 2,
                total_candles: 10,
                ..SimulationCursor::default()
            },
        );
        let source = MemoryCandleSource::new().with_candles(
            "AVAXUSDT",
            "1h",
            vec![Candle::from_ohlc(0, 60_000, 1.0, 2.0, 0.5, 1.5)],
        );
        let mut engine = SimulationEngine::new(
            source,
            MemoryStateStore::with_state(state),
            StdRng::seed_from_u64(2),
            EngineOptions::default(),
        )
        .unwrap();

        let tick = engine.get_current_price("AVAXUSDT", "1h").unwrap();
        assert_eq!(tick.simulation_progress.candle_index, 0);
        assert_eq!(tick.simulation_progress.point_index, 0);
        assert_eq!(tick.simulation_progress.total_candles, 1);
    }
}
