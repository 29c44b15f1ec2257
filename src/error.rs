use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("no candle data available for {symbol} at {interval} interval")]
    NotFound { symbol: String, interval: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("binance API error (code {code}): {msg}")]
    BinanceApi { code: i64, msg: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn not_found(symbol: &str, interval: &str) -> Self {
        Self::NotFound {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        }
    }
}
