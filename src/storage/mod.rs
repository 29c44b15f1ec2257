pub mod csv_store;

use std::collections::HashMap;

use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::sim_key::SimKey;

pub use csv_store::{CandleRecord, CsvCandleStore, DataFileSummary};

/// Supplies the ordered candle history for a symbol and interval.
///
/// `Ok(None)` means no data exists for the pair; `Err` means data exists but
/// could not be read.
pub trait CandleSource {
    fn load_candles(&self, symbol: &str, interval: &str) -> Result<Option<Vec<Candle>>, AppError>;
}

/// Fixed candle sets keyed by `(symbol, interval)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCandleSource {
    candles: HashMap<SimKey, Vec<Candle>>,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, symbol: &str, interval: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(SimKey::new(symbol, interval), candles);
        self
    }
}

impl CandleSource for MemoryCandleSource {
    fn load_candles(&self, symbol: &str, interval: &str) -> Result<Option<Vec<Candle>>, AppError> {
        Ok(self.candles.get(&SimKey::new(symbol, interval)).cloned())
    }
}
