//! Take-profit poller
//!
//! Closes every accepted entry once its market has ended: reconcile the
//! fill, cancel an underfilled remainder, then sell the filled size at the
//! best bid once the bid reaches the take-profit price.

use crate::clock::Clock;
use crate::config::TakeProfitConfig;
use crate::position::{terminal, EntryOrder, TakeProfitQueue};
use crate::scheduler::{sleep_or_shutdown, Trigger};
use crate::store::{Ledger, OrderRecord};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use crate::venue::{OrderRequest, Side, Venue, VenueError};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeProfitState {
    /// Waiting for the cron trigger
    Idle,
    /// Triggered; deciding whether there is anything to poll
    ArmedForHour,
    /// Running a pass every poll interval
    Polling,
}

/// Result of one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Orders whose market had ended and were examined
    pub processed: usize,
    /// Take-profit sells accepted
    pub sold: usize,
    /// Orders newly marked with a terminal error
    pub errored: usize,
    /// Ended orders still unresolved after the pass
    pub outstanding: usize,
}

/// Independent poller closing filled positions for one market symbol
pub struct TakeProfitManager {
    symbol: String,
    config: TakeProfitConfig,
    trigger: Trigger,
    venue: Arc<dyn Venue>,
    queue: TakeProfitQueue,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    state: TakeProfitState,
}

impl TakeProfitManager {
    pub fn new(
        symbol: impl Into<String>,
        config: TakeProfitConfig,
        trigger: Trigger,
        venue: Arc<dyn Venue>,
        queue: TakeProfitQueue,
        ledger: Ledger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            trigger,
            venue,
            queue,
            ledger,
            clock,
            state: TakeProfitState::Idle,
        }
    }

    pub fn state(&self) -> TakeProfitState {
        self.state
    }

    /// Run the state machine until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(symbol = %self.symbol, "Take-profit manager started");
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            let next = match self.state {
                TakeProfitState::Idle => {
                    if !self.trigger.wait_next(self.clock.as_ref(), &mut shutdown).await {
                        break;
                    }
                    TakeProfitState::ArmedForHour
                }
                TakeProfitState::ArmedForHour => {
                    if self.outstanding().await > 0 {
                        TakeProfitState::Polling
                    } else {
                        TakeProfitState::Idle
                    }
                }
                TakeProfitState::Polling => {
                    let summary = self.run_pass().await;
                    if summary.outstanding == 0 {
                        TakeProfitState::Idle
                    } else if sleep_or_shutdown(poll_interval, &mut shutdown).await {
                        TakeProfitState::Polling
                    } else {
                        break;
                    }
                }
            };

            if next != self.state {
                tracing::debug!(symbol = %self.symbol, from = ?self.state, to = ?next, "Take-profit state");
            }
            self.state = next;
        }

        tracing::info!(symbol = %self.symbol, "Take-profit manager stopped");
    }

    /// Unresolved orders whose market has ended
    async fn outstanding(&self) -> usize {
        let now = self.clock.now();
        self.queue
            .lock()
            .await
            .iter()
            .filter(|o| !o.is_resolved() && o.seconds_since_end(now) >= 0)
            .count()
    }

    /// Process every unresolved order whose market has ended
    pub async fn run_pass(&self) -> PassSummary {
        let now = self.clock.now();
        let due: Vec<EntryOrder> = self
            .queue
            .lock()
            .await
            .iter()
            .filter(|o| !o.is_resolved() && o.seconds_since_end(now) >= 0)
            .cloned()
            .collect();

        let mut summary = PassSummary::default();
        for mut order in due {
            summary.processed += 1;
            self.process_order(&mut order, now).await;

            if order.take_profit_order_id.is_some() {
                summary.sold += 1;
            } else if order.error.is_some() {
                summary.errored += 1;
                increment(CounterMetric::TerminalErrors, &self.symbol);
            } else {
                summary.outstanding += 1;
            }
            self.write_back(order).await;
        }

        let pending = {
            let mut queue = self.queue.lock().await;
            queue.retain(|o| !o.is_resolved());
            queue.len()
        };
        set_gauge(GaugeMetric::PendingTakeProfits, &self.symbol, pending as f64);

        if summary.processed > 0 {
            tracing::info!(
                symbol = %self.symbol,
                processed = summary.processed,
                sold = summary.sold,
                errored = summary.errored,
                outstanding = summary.outstanding,
                "Take-profit pass"
            );
        }
        summary
    }

    /// Copy the fields this manager owns back into the shared queue
    async fn write_back(&self, order: EntryOrder) {
        let mut queue = self.queue.lock().await;
        if let Some(slot) = queue
            .iter_mut()
            .find(|o| o.entry_order_id == order.entry_order_id)
        {
            slot.record_matched(order.matched_size);
            slot.cancelled = order.cancelled;
            slot.error = order.error;
            slot.take_profit_order_id = order.take_profit_order_id;
            slot.profit = order.profit;
        }
    }

    async fn process_order(&self, order: &mut EntryOrder, now: DateTime<Utc>) {
        if order.seconds_since_end(now) > self.config.give_up_after_secs {
            tracing::warn!(
                symbol = %self.symbol,
                order_id = %order.entry_order_id,
                matched = %order.matched_size,
                "Giving up on unresolved order"
            );
            self.mark_terminal(order, terminal::EXPIRED).await;
            return;
        }

        match self.try_close(order, now).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    symbol = %self.symbol,
                    order_id = %order.entry_order_id,
                    error = %e,
                    "Take-profit step failed, retrying next pass"
                );
            }
            Err(e) => {
                tracing::error!(
                    symbol = %self.symbol,
                    order_id = %order.entry_order_id,
                    error = %e,
                    "Take-profit step failed permanently"
                );
                self.mark_terminal(order, &e.to_string()).await;
            }
        }
    }

    async fn try_close(&self, order: &mut EntryOrder, now: DateTime<Utc>) -> Result<(), VenueError> {
        let Some(venue_order) = self.venue.get_order(&order.entry_order_id).await? else {
            self.mark_terminal(order, terminal::NOT_FOUND).await;
            return Ok(());
        };

        if order.record_matched(venue_order.size_matched) {
            let matched = order.matched_size;
            self.update_row(order, |r| r.matched_size = Some(matched)).await;
        }

        if !order.cancelled && !order.is_fully_filled() {
            let bid = self.venue.best_price(&order.token_id).await?.bid;
            let within_grace = order.seconds_since_end(now) < self.config.cancel_grace_secs;
            if bid <= order.entry_price && within_grace {
                tracing::debug!(
                    symbol = %self.symbol,
                    order_id = %order.entry_order_id,
                    bid = %bid,
                    price = %order.entry_price,
                    "Underfilled order left standing"
                );
                return Ok(());
            }

            self.venue.cancel_order(&order.entry_order_id).await?;
            order.cancelled = true;
            let matched = order.matched_size;
            self.update_row(order, |r| {
                r.matched_size = Some(matched);
                r.profit = Some(Decimal::ZERO);
            })
            .await;
            tracing::info!(
                symbol = %self.symbol,
                order_id = %order.entry_order_id,
                matched = %matched,
                requested = %order.requested_size,
                "Cancelled unfilled remainder"
            );

            let whole_shares =
                matched.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            if whole_shares < Decimal::ONE {
                self.mark_terminal(order, terminal::UNFILLED).await;
                return Ok(());
            }
        }

        if order.matched_size <= Decimal::ZERO {
            return Ok(());
        }

        let bid = self.venue.best_price(&order.token_id).await?.bid;
        if bid <= Decimal::ZERO || bid < self.config.take_profit_price {
            tracing::debug!(
                symbol = %self.symbol,
                order_id = %order.entry_order_id,
                bid = %bid,
                "Bid below take-profit price"
            );
            return Ok(());
        }

        let response = self
            .venue
            .place_order(OrderRequest {
                token_id: order.token_id.clone(),
                side: Side::Sell,
                price: bid,
                size: order.matched_size,
            })
            .await?;
        let Some(sell_id) = response.accepted_id().map(str::to_string) else {
            tracing::warn!(
                symbol = %self.symbol,
                order_id = %order.entry_order_id,
                reason = response.error_msg.as_deref().unwrap_or("no order id"),
                "Take-profit order rejected, retrying next pass"
            );
            return Ok(());
        };

        let profit = (bid - order.entry_price) * order.matched_size;
        order.take_profit_order_id = Some(sell_id.clone());
        order.profit = Some(profit);
        let matched = order.matched_size;
        self.update_row(order, |r| {
            r.take_profit_order_id = Some(sell_id.clone());
            r.profit = Some(profit);
            r.matched_size = Some(matched);
        })
        .await;

        increment(CounterMetric::TakeProfits, &self.symbol);
        tracing::info!(
            symbol = %self.symbol,
            order_id = %order.entry_order_id,
            take_profit_order_id = %sell_id,
            bid = %bid,
            size = %matched,
            profit = %profit,
            "Take-profit order placed"
        );
        Ok(())
    }

    async fn mark_terminal(&self, order: &mut EntryOrder, error: &str) {
        order.error = Some(error.to_string());
        let matched = order.matched_size;
        let error = error.to_string();
        self.update_row(order, |r| {
            r.error = Some(error);
            r.matched_size = Some(matched);
        })
        .await;
    }

    async fn update_row<F>(&self, order: &EntryOrder, f: F)
    where
        F: FnOnce(&mut OrderRecord),
    {
        match self
            .ledger
            .update(&order.event_slug, &order.entry_order_id, f)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                order_id = %order.entry_order_id,
                "Ledger row already evicted"
            ),
            Err(e) => tracing::error!(
                order_id = %order.entry_order_id,
                error = %e,
                "Failed to persist order update"
            ),
        }
    }
}
