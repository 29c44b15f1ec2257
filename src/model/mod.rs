pub mod candle;
pub mod price_point;
pub mod sim_key;
