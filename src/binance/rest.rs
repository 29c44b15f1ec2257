use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::parse_interval_ms;
use crate::error::AppError;
use crate::model::candle::Candle;

use super::types::{
    parse_kline_row, AccountInfo, BinanceApiErrorResponse, ServerTimeResponse, TickerPrice,
};

/// Max rows per /fapi/v1/klines request.
pub const MAX_KLINES_PER_REQUEST: usize = 1500;

/// Binance USD-M futures REST client.
pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    recv_window: u64,
    // Simple rate limiter: request count in current minute window
    request_count: AtomicU64,
    window_start: std::sync::Mutex<Instant>,
}

impl BinanceRestClient {
    pub fn new(base_url: &str, api_key: &str, secret_key: &str, recv_window: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            recv_window,
            request_count: AtomicU64::new(0),
            window_start: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty()
    }

    fn sign(&self, query: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let full_query = if query.is_empty() {
            format!("recvWindow={}&timestamp={}", self.recv_window, timestamp)
        } else {
            format!(
                "{}&recvWindow={}&timestamp={}",
                query, self.recv_window, timestamp
            )
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| AppError::Config(format!("invalid API secret: {}", e)))?;
        mac.update(full_query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}&signature={}", full_query, signature))
    }

    fn check_rate_limit(&self) {
        let Ok(mut start) = self.window_start.lock() else {
            return;
        };
        if start.elapsed().as_secs() >= 60 {
            *start = Instant::now();
            self.request_count.store(0, Ordering::Relaxed);
        }
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 1920 {
            tracing::warn!(count, "Approaching rate limit (80% of 2400/min)");
        }
    }

    async fn error_from_response(resp: reqwest::Response, what: &str) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
            return AppError::BinanceApi {
                code: err.code,
                msg: err.msg,
            }
            .into();
        }
        anyhow::anyhow!("{} failed with status {}: {}", what, status, body)
    }

    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/fapi/v1/ping", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .context("ping failed")?
            .error_for_status()
            .context("ping returned error status")?;
        Ok(())
    }

    pub async fn server_time(&self) -> Result<u64> {
        let url = format!("{}/fapi/v1/time", self.base_url);
        let resp: ServerTimeResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("server_time failed")?
            .json()
            .await?;
        Ok(resp.server_time)
    }

    pub async fn ticker_price(&self, symbol: &str) -> Result<TickerPrice> {
        self.check_rate_limit();
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("ticker_price HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp, "ticker_price").await);
        }
        Ok(resp.json().await.context("ticker_price JSON parse failed")?)
    }

    /// One page of klines in `[start_ms, end_ms]`, oldest first.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: Option<u64>,
        end_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.check_rate_limit();
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_ascii_uppercase()),
            ("interval", interval.to_string()),
            ("limit", limit),
        ];
        if let Some(start) = start_ms {
            query.push(("startTime", start.to_string()));
        }
        if let Some(end) = end_ms {
            query.push(("endTime", end.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("get_klines HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp, "get_klines").await);
        }

        let rows: Vec<Value> = resp.json().await.context("get_klines JSON parse failed")?;
        rows.iter().map(parse_kline_row).collect()
    }

    /// Every kline in `[start_ms, end_ms]`, paging forward until the range is exhausted.
    pub async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<Candle>> {
        let interval_ms = parse_interval_ms(interval)?;
        let mut out: Vec<Candle> = Vec::new();
        let mut cursor = start_ms;

        while cursor <= end_ms {
            let page = self
                .get_klines(
                    symbol,
                    interval,
                    Some(cursor),
                    Some(end_ms),
                    MAX_KLINES_PER_REQUEST,
                )
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            let next = last.open_time + interval_ms;
            let short_page = page.len() < MAX_KLINES_PER_REQUEST;
            out.extend(page);
            if short_page || next <= cursor {
                break;
            }
            cursor = next;
        }

        tracing::info!(
            symbol,
            interval,
            start_ms,
            end_ms,
            count = out.len(),
            "Fetched historical klines"
        );
        Ok(out)
    }

    /// Signed futures account snapshot; needs API credentials.
    pub async fn account_info(&self) -> Result<AccountInfo> {
        if !self.has_credentials() {
            return Err(AppError::Config(
                "BINANCE_API_KEY and BINANCE_API_SECRET are required for account info".to_string(),
            )
            .into());
        }
        self.check_rate_limit();

        let signed = self.sign("")?;
        let url = format!("{}/fapi/v2/account?{}", self.base_url, signed);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("account_info HTTP failed")?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp, "account_info").await);
        }
        Ok(resp.json().await.context("account_info JSON parse failed")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signing_produces_hex_signature() {
        let client = BinanceRestClient::new(
            "https://testnet.binancefuture.com",
            "test_key",
            "test_secret",
            5000,
        );
        let signed = client.sign("symbol=BTCUSDT").unwrap();
        assert!(signed.starts_with("symbol=BTCUSDT&recvWindow=5000&timestamp="));
        assert!(signed.contains("&signature="));

        // Signature should be 64-char hex (SHA256)
        let sig = signed.split("&signature=").nth(1).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn empty_query_signs_without_leading_separator() {
        let client = BinanceRestClient::new("https://fapi.binance.com/", "k", "s", 5000);
        let signed = client.sign("").unwrap();
        assert!(signed.starts_with("recvWindow=5000&timestamp="));
        assert_eq!(client.base_url, "https://fapi.binance.com");
    }

    #[test]
    fn hmac_known_vector() {
        // Binance docs example: queryString with known secret should produce known signature
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[tokio::test]
    async fn account_info_requires_credentials() {
        let client = BinanceRestClient::new("http://127.0.0.1:9", "", "", 5000);
        let err = client.account_info().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Config(_))
        ));
    }
}
