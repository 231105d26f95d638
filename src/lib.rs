//! poly-tail: tail convergence trading bot for Polymarket hourly up/down markets
//!
//! This library provides the core components for:
//! - Market discovery by slug template via the Gamma API
//! - Divergence and amplitude of the underlying from Binance klines
//! - Time-based entry thresholds and signal evaluation
//! - Risk gating of extra entries
//! - Entry lifecycle and take-profit polling
//! - Cron-driven hourly scheduling in a configured timezone
//! - JSON state persistence
//! - Logging and Prometheus metrics

pub mod cli;
pub mod clock;
pub mod config;
pub mod market;
pub mod orderbook;
pub mod position;
pub mod risk;
pub mod scheduler;
pub mod signal;
pub mod store;
pub mod takeprofit;
pub mod telemetry;
pub mod venue;
pub mod volatility;
