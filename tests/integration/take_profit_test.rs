//! Take-profit manager tests: fill reconciliation, cancellation and selling

mod common;

use chrono::Duration;
use common::*;
use poly_tail::clock::{Clock, ManualClock, TokioClock};
use poly_tail::config::TakeProfitConfig;
use poly_tail::market::Outcome;
use poly_tail::position::{take_profit_queue, terminal, EntryKind, EntryOrder, TakeProfitQueue};
use poly_tail::scheduler::Trigger;
use poly_tail::store::{Ledger, MemoryStore, OrderRecord};
use poly_tail::takeprofit::{TakeProfitManager, TakeProfitState};
use poly_tail::venue::{OrderRequest, Side, Venue};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::watch;

struct Harness {
    venue: Arc<MockVenue>,
    store: Arc<MemoryStore>,
    queue: TakeProfitQueue,
    ledger: Ledger,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            venue: Arc::new(MockVenue::new()),
            ledger: Ledger::empty(store.clone(), serde_json::Value::Null, 5),
            store,
            queue: take_profit_queue(),
        }
    }

    fn manager(&self, clock: Arc<dyn Clock>) -> TakeProfitManager {
        let trigger = Trigger::parse("0-1 * * * *", chrono_tz::America::New_York).unwrap();
        TakeProfitManager::new(
            "btc",
            TakeProfitConfig::default(),
            trigger,
            self.venue.clone(),
            self.queue.clone(),
            self.ledger.clone(),
            clock,
        )
    }

    /// Place a 10-share BUY at 0.97 with `matched` filled and hand it over
    async fn entry(&self, matched: Decimal) -> String {
        let response = self
            .venue
            .place_order(OrderRequest {
                token_id: YES.to_string(),
                side: Side::Buy,
                price: dec!(0.97),
                size: dec!(10),
            })
            .await
            .unwrap();
        let order_id = response.order_id.unwrap();
        self.venue.set_matched(&order_id, matched);

        let order = EntryOrder {
            symbol: "btc".to_string(),
            token_id: YES.to_string(),
            entry_order_id: order_id.clone(),
            requested_size: dec!(10),
            matched_size: Decimal::ZERO,
            entry_price: dec!(0.97),
            outcome: Outcome::Up,
            kind: EntryKind::Initial,
            event_slug: EVENT_SLUG.to_string(),
            market_slug: EVENT_SLUG.to_string(),
            market_end: market_end(),
            error: None,
            take_profit_order_id: None,
            profit: None,
            cancelled: false,
        };
        self.ledger
            .append(EVENT_SLUG, order.to_record())
            .await
            .unwrap();
        self.queue.lock().await.push(order);
        order_id
    }

    fn row(&self, order_id: &str) -> OrderRecord {
        self.store
            .saved()
            .unwrap()
            .orders
            .orders(EVENT_SLUG)
            .unwrap()
            .iter()
            .find(|r| r.order_id == order_id)
            .cloned()
            .unwrap()
    }
}

fn after_end(secs: i64) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(market_end() + Duration::seconds(secs)))
}

#[tokio::test]
async fn test_full_fill_sold_exactly_once() {
    let h = Harness::new();
    let order_id = h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    let manager = h.manager(after_end(5));

    let summary = manager.run_pass().await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.sold, 1);
    assert_eq!(summary.outstanding, 0);

    for _ in 0..3 {
        let summary = manager.run_pass().await;
        assert_eq!(summary.processed, 0);
    }

    let sells = h.venue.sells();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].1.price, dec!(0.995));
    assert_eq!(sells[0].1.size, dec!(10));
    assert!(h.venue.cancels().is_empty());
    assert!(h.queue.lock().await.is_empty());

    let row = h.row(&order_id);
    assert_eq!(row.take_profit_order_id.as_deref(), Some(sells[0].0.as_str()));
    assert_eq!(row.matched_size, Some(dec!(10)));
    assert_eq!(row.profit, Some(dec!(0.250)));
}

#[tokio::test]
async fn test_waits_for_bid_to_reach_take_profit_price() {
    let h = Harness::new();
    h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.985), dec!(0.99));
    let manager = h.manager(after_end(5));

    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 0);
    assert_eq!(summary.outstanding, 1);
    assert!(h.venue.sells().is_empty());

    h.venue.set_quote(YES, dec!(0.99), dec!(0.995));
    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 1);
    assert_eq!(h.venue.sells().len(), 1);
}

#[tokio::test]
async fn test_orders_before_market_end_are_left_alone() {
    let h = Harness::new();
    h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    let manager = h.manager(Arc::new(ManualClock::new(at_minute(59, 0))));

    let summary = manager.run_pass().await;
    assert_eq!(summary.processed, 0);
    assert!(h.venue.sells().is_empty());
    assert_eq!(h.queue.lock().await.len(), 1);
}

#[tokio::test]
async fn test_unfilled_order_cancelled_after_grace() {
    let h = Harness::new();
    let order_id = h.entry(Decimal::ZERO).await;
    h.venue.set_quote(YES, dec!(0.40), dec!(0.45));
    let manager = h.manager(after_end(180));

    let summary = manager.run_pass().await;
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.outstanding, 0);
    assert_eq!(h.venue.cancels(), vec![order_id.clone()]);
    assert!(h.venue.order(&order_id).unwrap().cancelled);
    assert!(h.venue.sells().is_empty());
    assert!(h.queue.lock().await.is_empty());

    let row = h.row(&order_id);
    assert_eq!(row.error.as_deref(), Some(terminal::UNFILLED));
    assert_eq!(row.profit, Some(Decimal::ZERO));
}

#[tokio::test]
async fn test_underfilled_order_left_standing_within_grace() {
    let h = Harness::new();
    h.entry(Decimal::ZERO).await;
    // Bid equal to the entry price is not a reason to cancel yet
    h.venue.set_quote(YES, dec!(0.97), dec!(0.98));
    let manager = h.manager(after_end(30));

    let summary = manager.run_pass().await;
    assert_eq!(summary.outstanding, 1);
    assert!(h.venue.cancels().is_empty());
}

#[tokio::test]
async fn test_underfilled_order_cancelled_when_bid_clears_entry() {
    let h = Harness::new();
    let order_id = h.entry(dec!(6)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    let manager = h.manager(after_end(30));

    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 1);
    assert_eq!(h.venue.cancels(), vec![order_id.clone()]);
    let sells = h.venue.sells();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].1.size, dec!(6));

    let row = h.row(&order_id);
    assert_eq!(row.matched_size, Some(dec!(6)));
    assert_eq!(row.profit, Some(dec!(0.150)));
}

#[tokio::test]
async fn test_partial_fill_cancelled_once() {
    let h = Harness::new();
    let order_id = h.entry(dec!(6)).await;
    h.venue.set_quote(YES, dec!(0.98), dec!(0.985));
    let manager = h.manager(after_end(300));

    for _ in 0..3 {
        let summary = manager.run_pass().await;
        assert_eq!(summary.outstanding, 1);
    }
    assert_eq!(h.venue.cancels(), vec![order_id.clone()]);
    assert!(h.venue.sells().is_empty());

    h.venue.set_quote(YES, dec!(0.99), dec!(0.995));
    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 1);
    assert_eq!(h.venue.cancels().len(), 1);
}

#[tokio::test]
async fn test_fill_below_one_share_is_unfilled() {
    let h = Harness::new();
    let order_id = h.entry(dec!(0.4)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    let manager = h.manager(after_end(200));

    manager.run_pass().await;
    assert_eq!(h.row(&order_id).error.as_deref(), Some(terminal::UNFILLED));
    assert!(h.venue.sells().is_empty());
}

#[tokio::test]
async fn test_half_share_fill_rounds_up_and_is_sold() {
    let h = Harness::new();
    let order_id = h.entry(dec!(0.5)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    let manager = h.manager(after_end(300));

    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 1);
    assert_eq!(h.venue.cancels(), vec![order_id.clone()]);
    let sells = h.venue.sells();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].1.size, dec!(0.5));
    assert!(h.row(&order_id).error.is_none());
}

#[tokio::test]
async fn test_vanished_order_is_not_found() {
    let h = Harness::new();
    let order_id = h.entry(dec!(10)).await;
    h.venue.forget_order(&order_id);
    let manager = h.manager(after_end(5));

    let summary = manager.run_pass().await;
    assert_eq!(summary.errored, 1);
    assert_eq!(h.row(&order_id).error.as_deref(), Some(terminal::NOT_FOUND));
    assert!(h.queue.lock().await.is_empty());
}

#[tokio::test]
async fn test_gives_up_long_after_end() {
    let h = Harness::new();
    let order_id = h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.5), dec!(0.6));
    let manager = h.manager(after_end(3601));

    let summary = manager.run_pass().await;
    assert_eq!(summary.errored, 1);
    let row = h.row(&order_id);
    assert_eq!(row.error.as_deref(), Some(terminal::EXPIRED));
    assert_eq!(row.matched_size, Some(Decimal::ZERO));
}

#[tokio::test]
async fn test_malformed_response_is_terminal() {
    let h = Harness::new();
    let order_id = h.entry(dec!(10)).await;
    h.venue.garble_next_get(1);
    let manager = h.manager(after_end(5));

    let summary = manager.run_pass().await;
    assert_eq!(summary.errored, 1);
    let error = h.row(&order_id).error.unwrap();
    assert!(error.contains("malformed"), "{}", error);
}

#[tokio::test]
async fn test_transient_failure_retried_next_pass() {
    let h = Harness::new();
    let order_id = h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    h.venue.fail_prices(1);
    let manager = h.manager(after_end(5));

    let summary = manager.run_pass().await;
    assert_eq!(summary.outstanding, 1);
    assert!(h.row(&order_id).error.is_none());

    let summary = manager.run_pass().await;
    assert_eq!(summary.sold, 1);
}

#[tokio::test]
async fn test_rejected_sell_retried_next_pass() {
    let h = Harness::new();
    h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    h.venue.reject_next(1);
    let manager = h.manager(after_end(5));

    assert_eq!(manager.run_pass().await.outstanding, 1);
    assert_eq!(manager.run_pass().await.sold, 1);
    assert_eq!(h.venue.sells().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_polls_after_trigger_until_sold() {
    let h = Harness::new();
    h.entry(dec!(10)).await;
    h.venue.set_quote(YES, dec!(0.98), dec!(0.985));

    // 30s before settlement; the trigger fires at 11:00 New York
    let clock = Arc::new(TokioClock::starting_at(market_end() - Duration::seconds(30)));
    let manager = h.manager(clock);
    assert_eq!(manager.state(), TakeProfitState::Idle);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(manager.run(shutdown_rx));

    // Triggered and polling, but the bid is short of the take-profit price
    tokio::time::sleep(std::time::Duration::from_secs(45)).await;
    assert!(h.venue.sells().is_empty());
    assert_eq!(h.queue.lock().await.len(), 1);

    h.venue.set_quote(YES, dec!(0.995), dec!(0.999));
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    assert_eq!(h.venue.sells().len(), 1);
    assert!(h.queue.lock().await.is_empty());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown_while_idle() {
    let h = Harness::new();
    let clock = Arc::new(TokioClock::starting_at(at_minute(10, 0)));
    let manager = h.manager(clock);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(manager.run(shutdown_rx));
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(h.venue.placed().is_empty());
}
