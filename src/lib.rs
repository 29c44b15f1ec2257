pub mod api;
pub mod binance;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod recorder;
pub mod retry;
pub mod simulation;
pub mod storage;
