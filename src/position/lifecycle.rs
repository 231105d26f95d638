//! Entry submission for one market symbol
//!
//! Each hourly cycle allows one initial entry and one extra entry. A flag
//! flips only once the venue has accepted the order; fills are reconciled
//! later by the take-profit manager.

use super::types::{EntryKind, EntryOrder, TakeProfitQueue};
use crate::config::{EntryConfig, MarketConfig};
use crate::market::MarketWindow;
use crate::risk::RiskGate;
use crate::signal::Signal;
use crate::store::Ledger;
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use crate::venue::{OrderRequest, Side, Venue, VenueError};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Entry submission errors. The scheduler logs these and retries next tick.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order size rounds to zero: {usdc} USDC at {price}")]
    ZeroSize { usdc: Decimal, price: Decimal },
    #[error("venue error: {0}")]
    Venue(#[from] VenueError),
    #[error("order rejected: {0}")]
    Rejected(String),
}

/// Per-cycle entry flags, reset at hour rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleFlags {
    pub initial_entry_done: bool,
    pub extra_entry_done: bool,
}

/// What a signal led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Initial entry accepted with this order id
    Initial(String),
    /// Extra entry accepted with this order id
    Extra(String),
    /// The risk gate declined the extra entry
    ExtraDeclined(String),
    /// Both entries already done this cycle
    Idle,
}

/// Shares bought for `usdc` at `price`, rounded down
pub fn entry_size(usdc: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (usdc / price).floor()
}

/// Drives entries for one market symbol
pub struct LifecycleManager {
    market: MarketConfig,
    entry: EntryConfig,
    venue: Arc<dyn Venue>,
    gate: RiskGate,
    queue: TakeProfitQueue,
    ledger: Ledger,
    flags: CycleFlags,
}

impl LifecycleManager {
    pub fn new(
        market: MarketConfig,
        entry: EntryConfig,
        venue: Arc<dyn Venue>,
        gate: RiskGate,
        queue: TakeProfitQueue,
        ledger: Ledger,
    ) -> Self {
        Self {
            market,
            entry,
            venue,
            gate,
            queue,
            ledger,
            flags: CycleFlags::default(),
        }
    }

    pub fn flags(&self) -> CycleFlags {
        self.flags
    }

    /// Start a new hourly cycle
    pub fn reset_cycle(&mut self) {
        if self.flags != CycleFlags::default() {
            tracing::debug!(symbol = %self.market.symbol, "Entry flags reset");
        }
        self.flags = CycleFlags::default();
    }

    /// Act on a signal: initial entry first, then a gated extra entry
    pub async fn on_signal(
        &mut self,
        window: &MarketWindow,
        signal: &Signal,
    ) -> Result<EntryAction, LifecycleError> {
        if !self.flags.initial_entry_done {
            let order_id = self
                .submit_entry(EntryKind::Initial, self.entry.position_size_usdc, window, signal)
                .await?;
            self.flags.initial_entry_done = true;
            return Ok(EntryAction::Initial(order_id));
        }

        if self.flags.extra_entry_done {
            return Ok(EntryAction::Idle);
        }

        let decision = self.gate.check_extra_entry(&self.market, signal).await;
        if !decision.allowed {
            return Ok(EntryAction::ExtraDeclined(decision.reason));
        }

        let order_id = self
            .submit_entry(
                EntryKind::Extra,
                self.entry.extra_position_size_usdc,
                window,
                signal,
            )
            .await?;
        self.flags.extra_entry_done = true;
        Ok(EntryAction::Extra(order_id))
    }

    async fn submit_entry(
        &self,
        kind: EntryKind,
        usdc: Decimal,
        window: &MarketWindow,
        signal: &Signal,
    ) -> Result<String, LifecycleError> {
        let size = entry_size(usdc, signal.price);
        if size <= Decimal::ZERO {
            return Err(LifecycleError::ZeroSize {
                usdc,
                price: signal.price,
            });
        }

        let request = OrderRequest {
            token_id: signal.token_id.clone(),
            side: Side::Buy,
            price: signal.price,
            size,
        };
        let response = match self.venue.place_order(request).await {
            Ok(response) => response,
            Err(e) => {
                increment(CounterMetric::EntriesFailed, &self.market.symbol);
                return Err(e.into());
            }
        };
        let Some(order_id) = response.accepted_id().map(str::to_string) else {
            increment(CounterMetric::EntriesFailed, &self.market.symbol);
            return Err(LifecycleError::Rejected(
                response
                    .error_msg
                    .unwrap_or_else(|| "no order id returned".to_string()),
            ));
        };

        tracing::info!(
            symbol = %self.market.symbol,
            market = %window.market_slug,
            %kind,
            order_id = %order_id,
            outcome = %signal.outcome,
            price = %signal.price,
            size = %size,
            "Entry order accepted"
        );
        increment(CounterMetric::EntriesAccepted, &self.market.symbol);

        let order = EntryOrder {
            symbol: self.market.symbol.clone(),
            token_id: signal.token_id.clone(),
            entry_order_id: order_id.clone(),
            requested_size: size,
            matched_size: Decimal::ZERO,
            entry_price: signal.price,
            outcome: signal.outcome,
            kind,
            event_slug: window.event_slug.clone(),
            market_slug: window.market_slug.clone(),
            market_end: window.end_time,
            error: None,
            take_profit_order_id: None,
            profit: None,
            cancelled: false,
        };
        let record = order.to_record();

        let pending = {
            let mut queue = self.queue.lock().await;
            queue.push(order);
            queue.iter().filter(|o| !o.is_resolved()).count()
        };
        set_gauge(
            GaugeMetric::PendingTakeProfits,
            &self.market.symbol,
            pending as f64,
        );

        // The order is live at the venue; a persistence failure must not undo the flag.
        if let Err(e) = self.ledger.append(&window.event_slug, record).await {
            tracing::error!(
                symbol = %self.market.symbol,
                order_id = %order_id,
                error = %e,
                "Failed to persist entry order"
            );
        }

        Ok(order_id)
    }
}
