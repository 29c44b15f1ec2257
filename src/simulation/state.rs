use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::price_point::PricePoint;
pub use crate::model::sim_key::SimKey;

pub const DEFAULT_SYMBOL: &str = "AVAXUSDT";
pub const DEFAULT_INTERVAL: &str = "1h";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationCursor {
    pub candle_index: usize,
    pub point_index: usize,
    pub total_candles: usize,
    #[serde(default)]
    pub current_price_points: Vec<PricePoint>,
    #[serde(default)]
    pub high_touched: bool,
    #[serde(default)]
    pub low_touched: bool,
}

impl SimulationCursor {
    pub fn new(total_candles: usize) -> Self {
        Self {
            total_candles,
            ..Self::default()
        }
    }

    pub fn clear_points(&mut self) {
        self.current_price_points.clear();
        self.point_index = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.point_index >= self.current_price_points.len()
    }
}

/// Everything the simulator persists between process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub current_symbol: String,
    pub current_interval: String,
    #[serde(default)]
    pub progress: BTreeMap<String, SimulationCursor>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SimulationState {
    pub fn with_defaults(symbol: &str, interval: &str) -> Self {
        Self {
            current_symbol: symbol.to_string(),
            current_interval: interval.to_string(),
            progress: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn cursor(&self, key: &SimKey) -> Option<&SimulationCursor> {
        self.progress.get(&key.storage_key())
    }

    pub fn mark_current(&mut self, key: &SimKey) {
        self.current_symbol = key.symbol.clone();
        self.current_interval = key.interval.clone();
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_SYMBOL, DEFAULT_INTERVAL)
    }
}

/// Durable home for [`SimulationState`].
///
/// `load` returns `Ok(None)` when nothing has been persisted yet. Callers treat
/// any error from either method as non-fatal.
pub trait StateStore {
    fn load(&self) -> Result<Option<SimulationState>>;
    fn save(&self, state: &SimulationState) -> Result<()>;
}

/// Pretty-printed JSON file, rewritten on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> Result<Option<SimulationState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let payload = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let state: SimulationState = serde_json::from_str(&payload)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &SimulationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(state)
            .context("failed to serialize simulation state json")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<SimulationState>>,
    fail: bool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SimulationState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            fail: false,
        }
    }

    /// Every load and save fails.
    pub fn failing() -> Self {
        Self {
            state: Mutex::new(None),
            fail: true,
        }
    }

    pub fn snapshot(&self) -> Option<SimulationState> {
        self.state.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<SimulationState>> {
        if self.fail {
            bail!("memory state store configured to fail");
        }
        let guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory state store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &SimulationState) -> Result<()> {
        if self.fail {
            bail!("memory state store configured to fail");
        }
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory state store lock poisoned"))?;
        *guard = Some(state.clone());
        Ok(())
    }
}
