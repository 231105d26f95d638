//! Binance klines-backed volatility service

use super::estimator::{amplitude, divergence_z, realized_sigma};
use super::{Candle, VolatilityError, VolatilityService};
use crate::clock::Clock;
use crate::config::VolatilityConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Binance REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Configuration for the Binance volatility service
#[derive(Debug, Clone)]
pub struct BinanceVolatilityConfig {
    pub base_url: String,
    /// Candles used for sigma and amplitude
    pub sigma_window: usize,
    /// How long fetched klines are reused
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

impl Default for BinanceVolatilityConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_API_URL.to_string(),
            sigma_window: 60,
            cache_ttl: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&VolatilityConfig> for BinanceVolatilityConfig {
    fn from(config: &VolatilityConfig) -> Self {
        Self {
            base_url: config.binance_url.trim_end_matches('/').to_string(),
            sigma_window: config.sigma_window_minutes.max(3),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            ..Self::default()
        }
    }
}

/// Volatility service over Binance 1-minute klines
pub struct BinanceVolatility {
    config: BinanceVolatilityConfig,
    client: Client,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<String, (Instant, Vec<Candle>)>>,
}

impl BinanceVolatility {
    pub fn new(config: BinanceVolatilityConfig, clock: Arc<dyn Clock>) -> Result<Self, VolatilityError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            clock,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Candles needed to cover both the sigma window and the full hour
    fn fetch_limit(&self) -> usize {
        (self.config.sigma_window + 1).max(61).min(1000)
    }

    async fn candles(&self, symbol: &str) -> Result<Vec<Candle>, VolatilityError> {
        if let Some((fetched_at, candles)) = self.cache.read().await.get(symbol) {
            if fetched_at.elapsed() < self.config.cache_ttl {
                return Ok(candles.clone());
            }
        }

        let candles = self.fetch_klines(symbol).await?;
        self.cache
            .write()
            .await
            .insert(symbol.to_string(), (Instant::now(), candles.clone()));
        Ok(candles)
    }

    async fn fetch_klines(&self, symbol: &str) -> Result<Vec<Candle>, VolatilityError> {
        let url = format!("{}/api/v3/klines", self.config.base_url);
        let limit = self.fetch_limit().to_string();

        tracing::trace!(url = %url, symbol, "Fetching klines");
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", "1m"), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(VolatilityError::Status { status, body });
        }

        let data: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| VolatilityError::Decode(e.to_string()))?;

        Ok(data.iter().filter_map(|arr| parse_kline_array(arr)).collect())
    }

    fn hour_start(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now - ChronoDuration::minutes(now.minute() as i64)
            - ChronoDuration::seconds(now.second() as i64)
            - ChronoDuration::nanoseconds(now.nanosecond() as i64)
    }
}

#[async_trait]
impl VolatilityService for BinanceVolatility {
    async fn z(&self, symbol: &str, remaining_secs: i64) -> Result<f64, VolatilityError> {
        let candles = self.candles(symbol).await?;
        let hour_start = self.hour_start();

        let hour_open = candles
            .iter()
            .find(|c| c.open_time >= hour_start)
            .map(|c| c.open)
            .ok_or_else(|| VolatilityError::InsufficientData(symbol.to_string()))?;
        let last = candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| VolatilityError::InsufficientData(symbol.to_string()))?;

        let window_start = candles.len().saturating_sub(self.config.sigma_window + 1);
        let sigma = realized_sigma(&candles[window_start..])
            .ok_or_else(|| VolatilityError::InsufficientData(symbol.to_string()))?;

        divergence_z(hour_open, last, sigma, remaining_secs)
            .ok_or_else(|| VolatilityError::InsufficientData(symbol.to_string()))
    }

    async fn one_hour_amp(&self, symbol: &str) -> Result<f64, VolatilityError> {
        let candles = self.candles(symbol).await?;
        let window_start = candles.len().saturating_sub(60);
        amplitude(&candles[window_start..])
            .ok_or_else(|| VolatilityError::InsufficientData(symbol.to_string()))
    }

    async fn hour_candles(&self, symbol: &str) -> Result<Vec<Candle>, VolatilityError> {
        let hour_start = self.hour_start();
        Ok(self
            .candles(symbol)
            .await?
            .into_iter()
            .filter(|c| c.open_time >= hour_start)
            .collect())
    }
}

/// Parse one kline array: `[openTime, "open", "high", "low", "close", ...]`
fn parse_kline_array(arr: &[serde_json::Value]) -> Option<Candle> {
    if arr.len() < 5 {
        return None;
    }
    Some(Candle {
        open_time: Utc.timestamp_millis_opt(arr[0].as_i64()?).single()?,
        open: arr[1].as_str()?.parse().ok()?,
        high: arr[2].as_str()?.parse().ok()?,
        low: arr[3].as_str()?.parse().ok()?,
        close: arr[4].as_str()?.parse().ok()?,
    })
}
