use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::simulation::{EngineOptions, MIN_POINTS_PER_CANDLE};

/// Intervals the recorder knows how to download.
pub const SUPPORTED_INTERVALS: [&str; 6] = ["1m", "5m", "15m", "1h", "4h", "1d"];

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub binance: BinanceConfig,
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    pub rest_base_url: String,
    pub recv_window: u64,
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub data_dir: PathBuf,
    pub state_file: String,
    pub points_per_candle: usize,
    pub default_symbol: String,
    pub default_interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub intervals: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub health_check_retries: u32,
    pub health_check_delay_ms: u64,
    pub pair_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Parse a Binance kline interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

/// Map a user-supplied interval onto [`SUPPORTED_INTERVALS`], falling back to `1h`.
pub fn recorder_interval_or_default(s: &str) -> &'static str {
    match SUPPORTED_INTERVALS.iter().find(|iv| **iv == s.trim()) {
        Some(iv) => *iv,
        None => {
            tracing::warn!(
                interval = s,
                valid = %SUPPORTED_INTERVALS.join(", "),
                "Invalid interval, falling back to 1h"
            );
            "1h"
        }
    }
}

/// Upper-case and de-duplicate `symbols`, keeping order; `fallback` when nothing is left.
pub fn normalize_symbols(symbols: &[String], fallback: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sym in symbols {
        let s = sym.trim().to_ascii_uppercase();
        if !s.is_empty() && !out.iter().any(|v| v == &s) {
            out.push(s);
        }
    }
    if out.is_empty() {
        out.push(fallback.trim().to_ascii_uppercase());
    }
    out
}

impl SimulationConfig {
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            points_per_candle: self.points_per_candle,
            default_symbol: self.default_symbol.trim().to_ascii_uppercase(),
            default_interval: self.default_interval.trim().to_string(),
        }
    }
}

impl RecorderConfig {
    /// Configured symbols, upper-cased and de-duplicated, or `fallback` when none are set.
    pub fn symbols_or(&self, fallback: &str) -> Vec<String> {
        normalize_symbols(&self.symbols, fallback)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_check_delay(&self) -> Duration {
        Duration::from_millis(self.health_check_delay_ms)
    }

    pub fn pair_pause(&self) -> Duration {
        Duration::from_millis(self.pair_pause_ms)
    }
}

impl Config {
    /// Load `config/default.toml` (or `$CANDLE_SIM_CONFIG`) plus credentials from `.env`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("CANDLE_SIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;

        // Klines are public; credentials only unlock the signed account endpoint.
        config.binance.api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
        config.binance.api_secret = std::env::var("BINANCE_API_SECRET").unwrap_or_default();

        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        parse_interval_ms(&self.simulation.default_interval)
            .context("simulation.default_interval is invalid")?;
        for interval in &self.recorder.intervals {
            parse_interval_ms(interval)
                .with_context(|| format!("recorder.intervals entry '{}' is invalid", interval))?;
        }
        if self.simulation.points_per_candle < MIN_POINTS_PER_CANDLE {
            bail!(
                "simulation.points_per_candle must be >= {}, got {}",
                MIN_POINTS_PER_CANDLE,
                self.simulation.points_per_candle
            );
        }
        if self.recorder.max_retries == 0 {
            bail!("recorder.max_retries must be > 0");
        }
        Ok(())
    }
}
