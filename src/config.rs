//! Configuration types for poly-tail

use crate::scheduler::CronSchedule;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors. Any of these is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no [[markets]] configured")]
    NoMarkets,
    #[error("duplicate market symbol: {0}")]
    DuplicateSymbol(String),
    #[error("invalid cron expression for {field}: {source}")]
    Cron {
        field: &'static str,
        #[source]
        source: crate::scheduler::CronError,
    },
    #[error("unknown timezone: {0}")]
    Timezone(String),
    #[error("live execution requires an external order signer and is not supported")]
    LiveUnsupported,
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub take_profit: TakeProfitConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

/// Trading venue endpoints and execution mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    /// HTTP timeout for every venue call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub mode: ExecutionMode,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}
fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            clob_url: default_clob_url(),
            gamma_url: default_gamma_url(),
            timeout_secs: default_timeout_secs(),
            mode: ExecutionMode::Paper,
        }
    }
}

/// Underlying price source for divergence and amplitude
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    #[serde(default = "default_binance_url")]
    pub binance_url: String,
    /// Number of 1m candles used for sigma and amplitude
    #[serde(default = "default_sigma_window")]
    pub sigma_window_minutes: usize,
    /// Klines are reused for this long between calls
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_binance_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_sigma_window() -> usize {
    60
}
fn default_cache_ttl_secs() -> u64 {
    5
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            binance_url: default_binance_url(),
            sigma_window_minutes: default_sigma_window(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Threshold curve parameters: `a + b * (t / 600)^k`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdParams {
    pub k: f64,
    pub a: f64,
    pub b: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            k: 0.3,
            a: 0.92,
            b: 0.06,
        }
    }
}

/// Entry signal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Minimum divergence score for the primary path
    #[serde(default = "default_z_min")]
    pub z_min: f64,
    /// Top price above this is too late to buy (primary path only)
    #[serde(default = "default_trigger_ceiling")]
    pub trigger_ceiling: Decimal,
    /// Minimum 1h realized amplitude of the underlying
    #[serde(default = "default_amp_min")]
    pub amp_min: f64,
    /// Liquidity chase: top price must exceed this
    #[serde(default = "default_liquidity_min_price")]
    pub liquidity_min_price: Decimal,
    /// Liquidity chase: wall-clock minute must exceed this
    #[serde(default = "default_liquidity_after_minute")]
    pub liquidity_after_minute: u32,
    /// Book level inspected for depletion
    #[serde(default = "default_liquidity_level")]
    pub liquidity_level: Decimal,
    /// Ask size at `liquidity_level` below this counts as depleted
    #[serde(default = "default_liquidity_depletion_size")]
    pub liquidity_depletion_size: Decimal,
    #[serde(default)]
    pub threshold: ThresholdParams,
}

fn default_z_min() -> f64 {
    1.5
}
fn default_trigger_ceiling() -> Decimal {
    Decimal::new(99, 2)
}
fn default_amp_min() -> f64 {
    0.001
}
fn default_liquidity_min_price() -> Decimal {
    Decimal::new(98, 2)
}
fn default_liquidity_after_minute() -> u32 {
    58
}
fn default_liquidity_level() -> Decimal {
    Decimal::new(99, 2)
}
fn default_liquidity_depletion_size() -> Decimal {
    Decimal::new(500, 0)
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            z_min: default_z_min(),
            trigger_ceiling: default_trigger_ceiling(),
            amp_min: default_amp_min(),
            liquidity_min_price: default_liquidity_min_price(),
            liquidity_after_minute: default_liquidity_after_minute(),
            liquidity_level: default_liquidity_level(),
            liquidity_depletion_size: default_liquidity_depletion_size(),
            threshold: ThresholdParams::default(),
        }
    }
}

/// Entry sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// USDC committed to the initial entry
    #[serde(default = "default_position_size")]
    pub position_size_usdc: Decimal,
    /// USDC committed to the extra entry
    #[serde(default = "default_position_size")]
    pub extra_position_size_usdc: Decimal,
}

fn default_position_size() -> Decimal {
    Decimal::new(10, 0)
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            position_size_usdc: default_position_size(),
            extra_position_size_usdc: default_position_size(),
        }
    }
}

/// Risk gate configuration (extra entries only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_weighted_threshold")]
    pub weighted_threshold: f64,
    /// Price history window for directional stability
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,
    /// Local hours (scheduler timezone) during which stability is dampened
    #[serde(default = "default_dampened_hours")]
    pub dampened_hours: Vec<u32>,
    #[serde(default = "default_dampening")]
    pub dampening: f64,
    #[serde(default = "default_late_boost_start")]
    pub late_boost_start_minute: u32,
    #[serde(default = "default_late_boost_per_minute")]
    pub late_boost_per_minute: f64,
    #[serde(default = "default_late_boost_cap")]
    pub late_boost_cap: f64,
    #[serde(default = "default_price_position_threshold")]
    pub price_position_threshold: f64,
    /// Candles inspected for the short-term trend check
    #[serde(default = "default_trend_candles")]
    pub trend_candles: usize,
    /// Ask depth (shares at or below 0.99) needed for the 0.97 ladder rung
    #[serde(default = "default_extra_min_seller_liquidity")]
    pub extra_min_seller_liquidity: Decimal,
}

fn default_weighted_threshold() -> f64 {
    0.75
}
fn default_lookback_minutes() -> i64 {
    10
}
fn default_dampened_hours() -> Vec<u32> {
    vec![9, 10]
}
fn default_dampening() -> f64 {
    0.05
}
fn default_late_boost_start() -> u32 {
    56
}
fn default_late_boost_per_minute() -> f64 {
    0.02
}
fn default_late_boost_cap() -> f64 {
    0.06
}
fn default_price_position_threshold() -> f64 {
    0.2
}
fn default_trend_candles() -> usize {
    3
}
fn default_extra_min_seller_liquidity() -> Decimal {
    Decimal::new(200, 0)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weighted_threshold: default_weighted_threshold(),
            lookback_minutes: default_lookback_minutes(),
            dampened_hours: default_dampened_hours(),
            dampening: default_dampening(),
            late_boost_start_minute: default_late_boost_start(),
            late_boost_per_minute: default_late_boost_per_minute(),
            late_boost_cap: default_late_boost_cap(),
            price_position_threshold: default_price_position_threshold(),
            trend_candles: default_trend_candles(),
            extra_min_seller_liquidity: default_extra_min_seller_liquidity(),
        }
    }
}

/// Take-profit poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeProfitConfig {
    /// Minimum best bid at which filled positions are sold
    #[serde(default = "default_take_profit_price")]
    pub take_profit_price: Decimal,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_take_profit_cron")]
    pub cron: String,
    /// After market end, underfilled entries are cancelled regardless of the bid
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: i64,
    /// After market end, unresolved entries are marked expired
    #[serde(default = "default_give_up_after_secs")]
    pub give_up_after_secs: i64,
}

fn default_take_profit_price() -> Decimal {
    Decimal::new(99, 2)
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_take_profit_cron() -> String {
    "0-1 * * * *".to_string()
}
fn default_cancel_grace_secs() -> i64 {
    120
}
fn default_give_up_after_secs() -> i64 {
    3600
}

impl Default for TakeProfitConfig {
    fn default() -> Self {
        Self {
            take_profit_price: default_take_profit_price(),
            poll_interval_secs: default_poll_interval_secs(),
            cron: default_take_profit_cron(),
            cancel_grace_secs: default_cancel_grace_secs(),
            give_up_after_secs: default_give_up_after_secs(),
        }
    }
}

/// Tick scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minute window that starts the hourly loop
    #[serde(default = "default_scheduler_cron")]
    pub cron: String,
    /// IANA timezone for cron matching, slugs and hour-of-day rules
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
}

fn default_scheduler_cron() -> String {
    "50 * * * *".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_base_interval_secs() -> u64 {
    30
}
fn default_min_interval_secs() -> u64 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: default_scheduler_cron(),
            timezone: default_timezone(),
            base_interval_secs: default_base_interval_secs(),
            min_interval_secs: default_min_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Parse the configured timezone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }
}

/// Persisted state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Event slugs retained in the order ledger
    #[serde(default = "default_max_event_slugs")]
    pub max_event_slugs: usize,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state.json")
}
fn default_max_event_slugs() -> usize {
    5
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            max_event_slugs: default_max_event_slugs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus listener port, 0 disables the exporter
    #[serde(default)]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormatConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            log_level: default_log_level(),
            log_format: LogFormatConfig::Pretty,
        }
    }
}

/// One traded market series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketConfig {
    /// Short name used in logs and metrics (e.g. "btc")
    pub symbol: String,
    /// Event slug template, e.g. "bitcoin-up-or-down-{month}-{day}-{hour}{ampm}-et"
    pub slug_template: String,
    /// Underlying spot symbol for the volatility service (e.g. "BTCUSDT")
    pub underlying: String,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that must hold before any scheduler starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markets.is_empty() {
            return Err(ConfigError::NoMarkets);
        }
        let mut seen = std::collections::HashSet::new();
        for market in &self.markets {
            if !seen.insert(market.symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(market.symbol.clone()));
            }
        }

        CronSchedule::parse(&self.scheduler.cron).map_err(|source| ConfigError::Cron {
            field: "scheduler.cron",
            source,
        })?;
        CronSchedule::parse(&self.take_profit.cron).map_err(|source| ConfigError::Cron {
            field: "take_profit.cron",
            source,
        })?;
        self.scheduler.tz()?;

        if self.venue.mode == ExecutionMode::Live {
            return Err(ConfigError::LiveUnsupported);
        }
        if self.scheduler.min_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.min_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.state.max_event_slugs == 0 {
            return Err(ConfigError::Invalid {
                field: "state.max_event_slugs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.entry.position_size_usdc <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "entry.position_size_usdc",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Find a configured market by symbol
    pub fn market(&self, symbol: &str) -> Option<&MarketConfig> {
        self.markets.iter().find(|m| m.symbol == symbol)
    }
}
