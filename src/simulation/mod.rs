pub mod engine;
pub mod path;
pub mod state;

pub use engine::{EngineOptions, PriceTick, ResetAck, SimulationEngine, SimulationProgress};
pub use path::{generate_price_path, DEFAULT_POINTS_PER_CANDLE, MIN_POINTS_PER_CANDLE};
pub use state::{
    JsonFileStateStore, MemoryStateStore, SimKey, SimulationCursor, SimulationState, StateStore,
};
