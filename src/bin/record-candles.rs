//! Download the standard historical windows from Binance futures into CSV files.
//!
//! Single pair:   `record-candles AVAXUSDT 1h`
//! Batch:         `record-candles --symbols BTCUSDT,ETHUSDT --intervals 1h,4h`

use anyhow::{anyhow, Result};
use clap::Parser;

use candle_sim::binance::rest::BinanceRestClient;
use candle_sim::config::{normalize_symbols, recorder_interval_or_default, Config};
use candle_sim::logging::init_tracing;
use candle_sim::recorder::{record_time_windows, WindowOutcome, WindowReport};
use candle_sim::retry::{HealthCheck, RetryPolicy};
use candle_sim::storage::CsvCandleStore;

#[derive(Parser)]
#[command(
    name = "record-candles",
    about = "Record recent and historical candle windows from Binance futures"
)]
struct Cli {
    /// Trading pair symbol. Defaults to simulation.default_symbol.
    symbol: Option<String>,

    /// Candle interval (1m, 5m, 15m, 1h, 4h, 1d). Defaults to simulation.default_interval.
    interval: Option<String>,

    /// Batch mode: comma-separated symbols. Overrides the positional symbol.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Batch mode: comma-separated intervals.
    #[arg(long, value_delimiter = ',')]
    intervals: Vec<String>,

    /// Batch mode over recorder.symbols and recorder.intervals from the config.
    #[arg(long, default_value_t = false)]
    all: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging)?;

    let cli = Cli::parse();
    let pairs = resolve_pairs(&cli, &config);

    let client = BinanceRestClient::new(
        &config.binance.rest_base_url,
        &config.binance.api_key,
        &config.binance.api_secret,
        config.binance.recv_window,
    );
    let store = CsvCandleStore::new(&config.simulation.data_dir);
    let retry = RetryPolicy::new(config.recorder.max_retries, config.recorder.retry_delay());
    let health = HealthCheck::new(
        config.recorder.health_check_retries,
        config.recorder.health_check_delay(),
    );

    health.ensure_healthy(|| client.ping()).await?;
    match client.server_time().await {
        Ok(server_ms) => {
            let drift_ms = chrono::Utc::now().timestamp_millis() - server_ms as i64;
            tracing::info!(server_ms, drift_ms, "Exchange server time");
        }
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "Could not read exchange server time"),
    }

    let today = chrono::Utc::now().date_naive();
    let total = pairs.len();
    for (i, (symbol, interval)) in pairs.iter().enumerate() {
        println!("\n[{}/{}] Recording {} {}", i + 1, total, symbol, interval);
        let reports = record_time_windows(&client, &store, &retry, symbol, interval, today).await;
        print_reports(&reports);
        if i + 1 < total {
            tokio::time::sleep(config.recorder.pair_pause()).await;
        }
    }

    print_data_summary(&store);
    Ok(())
}

fn resolve_pairs(cli: &Cli, config: &Config) -> Vec<(String, String)> {
    let default_symbol = cli
        .symbol
        .clone()
        .unwrap_or_else(|| config.simulation.default_symbol.clone());
    let default_interval = cli
        .interval
        .clone()
        .unwrap_or_else(|| config.simulation.default_interval.clone());

    let symbols = if !cli.symbols.is_empty() {
        normalize_symbols(&cli.symbols, &default_symbol)
    } else if cli.all {
        config.recorder.symbols_or(&default_symbol)
    } else {
        vec![default_symbol.trim().to_ascii_uppercase()]
    };

    let raw_intervals: Vec<String> = if !cli.intervals.is_empty() {
        cli.intervals.clone()
    } else if cli.all && !config.recorder.intervals.is_empty() {
        config.recorder.intervals.clone()
    } else {
        vec![default_interval]
    };
    let mut intervals: Vec<&'static str> = Vec::new();
    for raw in &raw_intervals {
        let iv = recorder_interval_or_default(raw);
        if !intervals.contains(&iv) {
            intervals.push(iv);
        }
    }

    symbols
        .iter()
        .flat_map(|s| intervals.iter().map(move |iv| (s.clone(), iv.to_string())))
        .collect()
}

fn print_reports(reports: &[WindowReport]) {
    for report in reports {
        let w = &report.window;
        match &report.outcome {
            WindowOutcome::Saved { path, candles } => println!(
                "  {:<11} {} -> {}  {:>5} candles  {}",
                w.name,
                w.start,
                w.end,
                candles,
                path.display()
            ),
            WindowOutcome::Empty => {
                println!("  {:<11} {} -> {}  no data", w.name, w.start, w.end)
            }
            WindowOutcome::Failed(err) => {
                println!("  {:<11} {} -> {}  FAILED: {}", w.name, w.start, w.end, err)
            }
        }
    }
}

fn print_data_summary(store: &CsvCandleStore) {
    println!("\nFiles in {}:", store.data_dir().display());
    match store.available_files() {
        Ok(files) if files.is_empty() => println!("  (none)"),
        Ok(files) => {
            for f in files {
                println!("  {:<40} {:>10.2} KB", f.file_name, f.size_kib);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list data directory");
            println!("  (unreadable: {})", e);
        }
    }
}
