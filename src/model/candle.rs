use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::AppError;

/// One OHLCV bucket as recorded from the exchange. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: u64,
    pub close_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
}

impl Candle {
    /// Candle with only the price corners and time span set.
    pub fn from_ohlc(open_time: u64, close_time: u64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume: 0.0,
            quote_volume: 0.0,
            trade_count: 0,
            taker_buy_base: 0.0,
            taker_buy_quote: 0.0,
        }
    }

    /// Checks `low <= min(open, close) <= max(open, close) <= high` and `open_time < close_time`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.open_time >= self.close_time {
            return Err(AppError::InvalidArgument(format!(
                "candle open_time {} must be before close_time {}",
                self.open_time, self.close_time
            )));
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low {
            return Err(AppError::InvalidArgument(format!(
                "candle low {} is above min(open, close) {}",
                self.low, body_low
            )));
        }
        if self.high < body_high {
            return Err(AppError::InvalidArgument(format!(
                "candle high {} is below max(open, close) {}",
                self.high, body_high
            )));
        }
        Ok(())
    }

    pub fn open_timestamp(&self) -> String {
        format_timestamp_ms(self.open_time)
    }

    pub fn close_timestamp(&self) -> String {
        format_timestamp_ms(self.close_time)
    }
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn format_timestamp_ms(ms: u64) -> String {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
