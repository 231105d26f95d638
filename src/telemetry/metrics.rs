//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types, labelled by market symbol
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Scheduler ticks evaluated
    Ticks,
    /// Divergence-path entry signals
    Signals,
    /// Liquidity-chase entry signals
    LiquiditySignals,
    /// Extra entries declined by the risk gate
    GateRejections,
    /// Entry orders accepted by the venue
    EntriesAccepted,
    /// Entry orders rejected or failed
    EntriesFailed,
    /// Take-profit sells accepted by the venue
    TakeProfits,
    /// Entry orders closed with a terminal error
    TerminalErrors,
}

/// Gauge metric types, labelled by market symbol
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current tick interval in seconds
    TickInterval,
    /// Entry orders awaiting take-profit
    PendingTakeProfits,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::Ticks => "polytail_ticks_total",
        CounterMetric::Signals => "polytail_signals_total",
        CounterMetric::LiquiditySignals => "polytail_liquidity_signals_total",
        CounterMetric::GateRejections => "polytail_gate_rejections_total",
        CounterMetric::EntriesAccepted => "polytail_entries_accepted_total",
        CounterMetric::EntriesFailed => "polytail_entries_failed_total",
        CounterMetric::TakeProfits => "polytail_take_profits_total",
        CounterMetric::TerminalErrors => "polytail_terminal_errors_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::TickInterval => "polytail_tick_interval_seconds",
        GaugeMetric::PendingTakeProfits => "polytail_pending_take_profits",
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric, symbol: &str) {
    metrics::counter!(counter_name(metric), "symbol" => symbol.to_string()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, symbol: &str, value: f64) {
    metrics::gauge!(gauge_name(metric), "symbol" => symbol.to_string()).set(value);
}

/// Install the Prometheus recorder with an HTTP listener on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
