use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::model::candle::Candle;

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Binance API error response.
#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Binance server time response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: u64,
}

/// GET /fapi/v1/ticker/price
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(default)]
    pub time: u64,
}

/// Futures account info response (GET /fapi/v2/account).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(deserialize_with = "string_to_f64")]
    pub total_wallet_balance: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub available_balance: f64,
    #[serde(default)]
    pub assets: Vec<AccountAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAsset {
    pub asset: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub wallet_balance: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub available_balance: f64,
}

/// Parse one kline row:
/// `[open_time, "open", "high", "low", "close", "volume", close_time,
///   "quote_volume", trades, "taker_base", "taker_quote", "ignore"]`.
pub fn parse_kline_row(row: &Value) -> Result<Candle> {
    let cols = row
        .as_array()
        .ok_or_else(|| anyhow!("kline row is not an array"))?;
    if cols.len() < 11 {
        return Err(anyhow!("kline row has {} columns, expected >= 11", cols.len()));
    }

    let int = |idx: usize| -> Result<u64> {
        cols[idx]
            .as_u64()
            .ok_or_else(|| anyhow!("kline column {} is not an integer", idx))
    };
    let num = |idx: usize| -> Result<f64> {
        match &cols[idx] {
            Value::String(s) => s
                .parse::<f64>()
                .with_context(|| format!("kline column {} is not numeric: {}", idx, s)),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| anyhow!("kline column {} is not a finite number", idx)),
            _ => Err(anyhow!("kline column {} has unexpected type", idx)),
        }
    };

    Ok(Candle {
        open_time: int(0)?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
        close_time: int(6)?,
        quote_volume: num(7)?,
        trade_count: int(8)?,
        taker_buy_base: num(9)?,
        taker_buy_quote: num(10)?,
    })
}
