use serde::{Deserialize, Serialize};

/// A single synthesized sub-price inside a candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: String,
    pub price: f64,
    pub is_open: bool,
    pub is_high: bool,
    pub is_low: bool,
    pub is_close: bool,
    pub point_index: usize,
    pub total_points: usize,
}

impl PricePoint {
    pub fn is_anchor(&self) -> bool {
        self.is_open || self.is_high || self.is_low || self.is_close
    }
}
