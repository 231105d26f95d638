//! Volatility module
//!
//! Divergence score and realized amplitude of the underlying spot market,
//! computed from Binance 1-minute klines.

mod binance;
pub mod estimator;

pub use binance::{BinanceVolatility, BinanceVolatilityConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 1-minute OHLC candle of the underlying
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Volatility service errors
#[derive(Debug, Error)]
pub enum VolatilityError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("price source returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed klines: {0}")]
    Decode(String),
    #[error("not enough data for {0}")]
    InsufficientData(String),
}

/// Scalar statistics about the underlying
#[async_trait]
pub trait VolatilityService: Send + Sync {
    /// Divergence of the current price from the hour open, scaled by the
    /// volatility expected over `remaining_secs`
    async fn z(&self, symbol: &str, remaining_secs: i64) -> Result<f64, VolatilityError>;
    /// Realized amplitude over the last hour, as a fraction of price
    async fn one_hour_amp(&self, symbol: &str) -> Result<f64, VolatilityError>;
    /// 1-minute candles since the start of the current hour, oldest first
    async fn hour_candles(&self, symbol: &str) -> Result<Vec<Candle>, VolatilityError>;
}
