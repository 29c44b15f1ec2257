//! Downloads the standard historical windows for a symbol and writes them as CSV.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, NaiveDate};

use crate::binance::rest::BinanceRestClient;
use crate::model::candle::Candle;
use crate::retry::RetryPolicy;
use crate::storage::{csv_store::RECENT_WINDOW, CsvCandleStore};

/// A named 10-day range, inclusive of both dates (UTC midnight).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub name: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn start_ms(&self) -> u64 {
        date_to_ms(self.start)
    }

    pub fn end_ms(&self) -> u64 {
        date_to_ms(self.end)
    }
}

fn date_to_ms(date: NaiveDate) -> u64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis().max(0) as u64)
        .unwrap_or(0)
}

/// `recent` is the last 10 days; the others are 10-day ranges centred one,
/// two and three years back.
pub fn standard_windows(today: NaiveDate) -> Vec<TimeWindow> {
    let centred = |name: &'static str, years: i64| TimeWindow {
        name,
        start: today - Duration::days(years * 365 + 5),
        end: today - Duration::days(years * 365 - 5),
    };
    vec![
        TimeWindow {
            name: RECENT_WINDOW,
            start: today - Duration::days(10),
            end: today,
        },
        centred("1year_ago", 1),
        centred("2years_ago", 2),
        centred("3years_ago", 3),
    ]
}

/// Anything that can fetch a closed range of klines.
pub trait KlineFetcher {
    fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> impl Future<Output = Result<Vec<Candle>>>;
}

impl KlineFetcher for BinanceRestClient {
    async fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<Candle>> {
        self.get_historical_klines(symbol, interval, start_ms, end_ms)
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Saved { path: PathBuf, candles: usize },
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub window: TimeWindow,
    pub outcome: WindowOutcome,
}

/// Fetch and persist every standard window. A failing window is logged and
/// reported; the remaining windows are still processed.
pub async fn record_time_windows<F: KlineFetcher>(
    fetcher: &F,
    store: &CsvCandleStore,
    retry: &RetryPolicy,
    symbol: &str,
    interval: &str,
    today: NaiveDate,
) -> Vec<WindowReport> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let windows = standard_windows(today);
    tracing::info!(%symbol, interval, count = windows.len(), "Recording time windows");

    let mut reports = Vec::with_capacity(windows.len());
    for window in windows {
        tracing::info!(
            %symbol,
            interval,
            window = window.name,
            start = %window.start,
            end = %window.end,
            "Processing window"
        );
        let label = format!("klines {} {} {}", symbol, interval, window.name);
        let (start_ms, end_ms) = (window.start_ms(), window.end_ms());
        let fetched = retry
            .run(&label, || fetcher.fetch_range(&symbol, interval, start_ms, end_ms))
            .await;

        let outcome = match fetched {
            Ok(candles) if candles.is_empty() => {
                tracing::warn!(%symbol, window = window.name, "No data to save for window");
                WindowOutcome::Empty
            }
            Ok(candles) => match store.write_window(&symbol, window.name, interval, &candles) {
                Ok(path) => WindowOutcome::Saved {
                    path,
                    candles: candles.len(),
                },
                Err(e) => {
                    tracing::error!(%symbol, window = window.name, error = %e, "Failed to save window");
                    WindowOutcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                tracing::error!(%symbol, window = window.name, error = %format!("{e:#}"), "Failed to fetch window");
                WindowOutcome::Failed(format!("{e:#}"))
            }
        };
        reports.push(WindowReport { window, outcome });
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn windows_are_ten_days_in_priority_order() {
        let windows = standard_windows(day(2025, 6, 15));
        let names: Vec<&str> = windows.iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["recent", "1year_ago", "2years_ago", "3years_ago"]);
        for w in &windows {
            assert_eq!((w.end - w.start).num_days(), 10, "{}", w.name);
        }
        assert_eq!(windows[0].end, day(2025, 6, 15));
        assert_eq!(windows[1].start, day(2024, 6, 10));
        assert_eq!(windows[1].end, day(2024, 6, 20));
    }

    #[test]
    fn window_bounds_are_utc_midnight_millis() {
        let w = TimeWindow {
            name: "recent",
            start: day(2024, 1, 1),
            end: day(2024, 1, 11),
        };
        assert_eq!(w.start_ms(), 1_704_067_200_000);
        assert_eq!(w.end_ms() - w.start_ms(), 10 * 86_400_000);
    }
}
