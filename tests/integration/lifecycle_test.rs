//! Entry lifecycle tests: one initial and one gated extra entry per cycle

mod common;

use common::*;
use poly_tail::clock::{Clock, ManualClock};
use poly_tail::config::{EntryConfig, RiskConfig};
use poly_tail::position::{
    take_profit_queue, EntryAction, EntryKind, LifecycleError, LifecycleManager, TakeProfitQueue,
};
use poly_tail::risk::RiskGate;
use poly_tail::store::{Ledger, MemoryStore};
use poly_tail::venue::Side;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    venue: Arc<MockVenue>,
    volatility: Arc<MockVolatility>,
    clock: ManualClock,
    store: Arc<MemoryStore>,
    queue: TakeProfitQueue,
    manager: LifecycleManager,
}

fn harness_with(entry: EntryConfig) -> Harness {
    let venue = Arc::new(MockVenue::new());
    let volatility = Arc::new(MockVolatility::new(2.0, 0.003));
    let clock = ManualClock::new(at_minute(30, 0));
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::empty(store.clone(), serde_json::Value::Null, 5);
    let queue = take_profit_queue();

    let gate = RiskGate::new(
        RiskConfig::default(),
        venue.clone(),
        volatility.clone(),
        Arc::new(clock.clone()),
        chrono_tz::America::New_York,
    );
    let manager = LifecycleManager::new(
        market(),
        entry,
        venue.clone(),
        gate,
        queue.clone(),
        ledger,
    );

    Harness {
        venue,
        volatility,
        clock,
        store,
        queue,
        manager,
    }
}

fn harness() -> Harness {
    harness_with(EntryConfig::default())
}

#[tokio::test]
async fn test_initial_entry_places_buy_and_queues_order() {
    let mut h = harness();
    let signal = signal(dec!(0.97), h.clock.now());

    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    let EntryAction::Initial(order_id) = action.clone() else {
        panic!("expected initial entry, got {:?}", action);
    };

    let placed = h.venue.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].0, order_id);
    assert_eq!(placed[0].1.side, Side::Buy);
    assert_eq!(placed[0].1.token_id, YES);
    assert_eq!(placed[0].1.price, dec!(0.97));
    assert_eq!(placed[0].1.size, dec!(10));
    assert!(h.manager.flags().initial_entry_done);

    let queue = h.queue.lock().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].kind, EntryKind::Initial);
    assert_eq!(queue[0].market_end, market_end());

    let saved = h.store.saved().unwrap();
    let rows = saved.orders.orders(EVENT_SLUG).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].order_id, order_id);
    assert!(rows[0].take_profit_order_id.is_none());
}

#[tokio::test]
async fn test_initial_entry_at_most_once_per_cycle() {
    let mut h = harness();
    // Gate declines every extra entry: history sits near even odds
    h.venue.set_history(YES, flat_history(0.55, h.clock.now()));
    let signal = signal(dec!(0.97), h.clock.now());

    assert!(matches!(
        h.manager.on_signal(&window(), &signal).await.unwrap(),
        EntryAction::Initial(_)
    ));
    for _ in 0..3 {
        let action = h.manager.on_signal(&window(), &signal).await.unwrap();
        assert!(matches!(action, EntryAction::ExtraDeclined(_)), "{:?}", action);
    }
    assert_eq!(h.venue.placed().len(), 1);
    assert!(!h.manager.flags().extra_entry_done);
}

#[tokio::test]
async fn test_rejected_entry_leaves_flag_unset() {
    let mut h = harness();
    h.venue.reject_next(1);
    let signal = signal(dec!(0.97), h.clock.now());

    let err = h.manager.on_signal(&window(), &signal).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Rejected(ref msg) if msg.contains("balance")));
    assert!(!h.manager.flags().initial_entry_done);
    assert!(h.queue.lock().await.is_empty());
    assert!(h.store.saved().is_none());

    // Retried on the next signal
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    assert!(matches!(action, EntryAction::Initial(_)));
}

#[tokio::test]
async fn test_transport_failure_leaves_flag_unset() {
    let mut h = harness();
    h.venue.fail_next_place(1);
    let signal = signal(dec!(0.97), h.clock.now());

    let err = h.manager.on_signal(&window(), &signal).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Venue(_)));
    assert!(!h.manager.flags().initial_entry_done);
}

#[tokio::test]
async fn test_zero_size_is_declined_without_an_order() {
    let mut h = harness_with(EntryConfig {
        position_size_usdc: dec!(0.5),
        extra_position_size_usdc: dec!(0.5),
    });
    let signal = signal(dec!(0.97), h.clock.now());

    let err = h.manager.on_signal(&window(), &signal).await.unwrap_err();
    assert!(matches!(err, LifecycleError::ZeroSize { .. }));
    assert!(h.venue.placed().is_empty());
    assert!(!h.manager.flags().initial_entry_done);
}

#[tokio::test]
async fn test_extra_entry_passes_gate_once() {
    let mut h = harness();
    h.venue.set_history(YES, flat_history(0.99, h.clock.now()));
    let signal = signal(dec!(0.99), h.clock.now());

    assert!(matches!(
        h.manager.on_signal(&window(), &signal).await.unwrap(),
        EntryAction::Initial(_)
    ));
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    let EntryAction::Extra(extra_id) = action.clone() else {
        panic!("expected extra entry, got {:?}", action);
    };
    assert_eq!(
        h.manager.on_signal(&window(), &signal).await.unwrap(),
        EntryAction::Idle
    );

    assert_eq!(h.venue.placed().len(), 2);
    let queue = h.queue.lock().await;
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[1].kind, EntryKind::Extra);
    assert_eq!(queue[1].entry_order_id, extra_id);

    let saved = h.store.saved().unwrap();
    assert_eq!(saved.orders.orders(EVENT_SLUG).unwrap().len(), 2);
}

#[tokio::test]
async fn test_extra_entry_allowed_at_moderate_stability() {
    // p = 0.8 scores 0.8288, dampened at 10am New York to 0.787
    let mut h = harness();
    h.venue.set_history(YES, flat_history(0.8, h.clock.now()));
    let signal = signal(dec!(0.99), h.clock.now());

    h.manager.on_signal(&window(), &signal).await.unwrap();
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    assert!(matches!(action, EntryAction::Extra(_)), "{:?}", action);
}

#[tokio::test]
async fn test_extra_entry_declined_by_ladder() {
    // 0.97 needs minute 57, amplitude 0.008 and sellers; it is minute 30
    let mut h = harness();
    h.venue.set_history(YES, flat_history(0.97, h.clock.now()));
    let signal = signal(dec!(0.97), h.clock.now());

    h.manager.on_signal(&window(), &signal).await.unwrap();
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    let EntryAction::ExtraDeclined(reason) = action.clone() else {
        panic!("expected decline, got {:?}", action);
    };
    assert!(reason.contains("ladder"), "{}", reason);
    assert_eq!(h.venue.placed().len(), 1);
}

#[tokio::test]
async fn test_extra_entry_bottom_rung_late_in_hour() {
    let mut h = harness();
    h.clock.set(at_minute(57, 30));
    h.volatility.set_amp(0.01);
    h.venue.set_history(YES, flat_history(0.97, h.clock.now()));
    h.venue
        .set_asks(YES, &[(dec!(0.97), dec!(150)), (dec!(0.99), dec!(100))]);
    let signal = signal(dec!(0.97), h.clock.now());

    h.manager.on_signal(&window(), &signal).await.unwrap();
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    assert!(matches!(action, EntryAction::Extra(_)), "{:?}", action);
}

#[tokio::test]
async fn test_extra_entry_declined_when_trend_retraced() {
    let mut h = harness();
    h.venue.set_history(YES, flat_history(0.99, h.clock.now()));
    // Rallied to 42100 then fell back to 42010
    let mut candles = rising_candles();
    let last = candles.len() - 1;
    candles[last].open = 42_100.0;
    candles[last].low = 42_010.0;
    candles[last].close = 42_010.0;
    h.volatility.set_candles(candles);
    let signal = signal(dec!(0.99), h.clock.now());

    h.manager.on_signal(&window(), &signal).await.unwrap();
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    let EntryAction::ExtraDeclined(reason) = action.clone() else {
        panic!("expected decline, got {:?}", action);
    };
    assert!(reason.contains("position"), "{}", reason);
}

#[tokio::test]
async fn test_extra_entry_declined_on_missing_data() {
    let mut h = harness();
    h.venue.set_history(YES, flat_history(0.99, h.clock.now()));
    let signal = signal(dec!(0.99), h.clock.now());
    h.manager.on_signal(&window(), &signal).await.unwrap();

    h.volatility.set_failing(true);
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    assert!(matches!(action, EntryAction::ExtraDeclined(_)));

    // No history at all
    h.volatility.set_failing(false);
    h.venue.set_history(YES, vec![]);
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    let EntryAction::ExtraDeclined(reason) = action.clone() else {
        panic!("expected decline, got {:?}", action);
    };
    assert!(reason.contains("history"), "{}", reason);
}

#[tokio::test]
async fn test_reset_cycle_allows_new_initial_entry() {
    let mut h = harness();
    let signal = signal(dec!(0.97), h.clock.now());
    h.manager.on_signal(&window(), &signal).await.unwrap();

    h.manager.reset_cycle();
    assert!(!h.manager.flags().initial_entry_done);
    let action = h.manager.on_signal(&window(), &signal).await.unwrap();
    assert!(matches!(action, EntryAction::Initial(_)));
    assert_eq!(h.venue.placed().len(), 2);
}
