use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CandleSource;
use crate::error::AppError;
use crate::model::candle::Candle;

pub const RECENT_WINDOW: &str = "recent";
/// Tried in order when no recent window file exists.
pub const FALLBACK_WINDOWS: [&str; 3] = ["1year_ago", "2years_ago", "3years_ago"];

/// One CSV row. Column names match the files the recorder writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    pub time: u64,
    #[serde(default)]
    pub datetime: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: u64,
    pub quote_asset_volume: f64,
    pub number_of_trades: u64,
    pub taker_buy_base_asset_volume: f64,
    pub taker_buy_quote_asset_volume: f64,
}

impl From<&Candle> for CandleRecord {
    fn from(c: &Candle) -> Self {
        let datetime = i64::try_from(c.open_time)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        Self {
            time: c.open_time,
            datetime,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            close_time: c.close_time,
            quote_asset_volume: c.quote_volume,
            number_of_trades: c.trade_count,
            taker_buy_base_asset_volume: c.taker_buy_base,
            taker_buy_quote_asset_volume: c.taker_buy_quote,
        }
    }
}

impl From<CandleRecord> for Candle {
    fn from(r: CandleRecord) -> Self {
        Self {
            open_time: r.time,
            close_time: r.close_time,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            quote_volume: r.quote_asset_volume,
            trade_count: r.number_of_trades,
            taker_buy_base: r.taker_buy_base_asset_volume,
            taker_buy_quote: r.taker_buy_quote_asset_volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFileSummary {
    pub file_name: String,
    pub size_kib: f64,
}

/// Flat CSV files under one directory, named `{SYMBOL}_{window}_{interval}.csv`.
#[derive(Debug, Clone)]
pub struct CsvCandleStore {
    data_dir: PathBuf,
}

impl CsvCandleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn window_path(&self, symbol: &str, window: &str, interval: &str) -> PathBuf {
        self.data_dir.join(format!(
            "{}_{}_{}.csv",
            symbol.trim().to_ascii_uppercase(),
            window,
            interval.trim()
        ))
    }

    /// First existing file among the recent window and the fallbacks.
    pub fn resolve_path(&self, symbol: &str, interval: &str) -> Option<PathBuf> {
        std::iter::once(RECENT_WINDOW)
            .chain(FALLBACK_WINDOWS)
            .map(|window| self.window_path(symbol, window, interval))
            .find(|path| path.exists())
    }

    pub fn load_window(
        &self,
        symbol: &str,
        window: &str,
        interval: &str,
    ) -> Result<Option<Vec<Candle>>, AppError> {
        let path = self.window_path(symbol, window, interval);
        if !path.exists() {
            return Ok(None);
        }
        read_candles(&path).map(Some)
    }

    pub fn write_window(
        &self,
        symbol: &str,
        window: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<PathBuf, AppError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.window_path(symbol, window, interval);
        let mut wtr = csv::Writer::from_path(&path)?;
        for candle in candles {
            wtr.serialize(CandleRecord::from(candle))?;
        }
        wtr.flush()?;
        tracing::info!(
            path = %path.display(),
            count = candles.len(),
            "Saved candles"
        );
        Ok(path)
    }

    /// CSV files in the data directory, sorted by name.
    pub fn available_files(&self) -> Result<Vec<DataFileSummary>, AppError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.ends_with(".csv") {
                continue;
            }
            let size_kib = entry.metadata()?.len() as f64 / 1024.0;
            out.push(DataFileSummary {
                file_name,
                size_kib,
            });
        }
        out.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(out)
    }
}

impl CandleSource for CsvCandleStore {
    fn load_candles(&self, symbol: &str, interval: &str) -> Result<Option<Vec<Candle>>, AppError> {
        let Some(path) = self.resolve_path(symbol, interval) else {
            tracing::warn!(symbol, interval, "No data file found");
            return Ok(None);
        };
        let candles = read_candles(&path)?;
        tracing::info!(
            path = %path.display(),
            count = candles.len(),
            "Loaded candles"
        );
        Ok(Some(candles))
    }
}

fn read_candles(path: &Path) -> Result<Vec<Candle>, AppError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut candles = Vec::new();
    for row in rdr.deserialize::<CandleRecord>() {
        candles.push(Candle::from(row?));
    }
    Ok(candles)
}
