//! Persisted ledger tests against the JSON file store

use poly_tail::cli::status::render;
use poly_tail::store::{read_state, JsonFileStore, Ledger, OrderRecord, StateStore, StoreError};
use poly_tail::venue::Side;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

fn record(order_id: &str) -> OrderRecord {
    OrderRecord {
        market_slug: "bitcoin-up-or-down-january-15-10am-et".to_string(),
        side: Side::Buy,
        order_id: order_id.to_string(),
        price: dec!(0.97),
        size: dec!(10),
        take_profit_order_id: None,
        matched_size: None,
        profit: None,
        outcome: Some("Up".to_string()),
        error: None,
    }
}

fn slug(i: usize) -> String {
    format!("bitcoin-up-or-down-january-15-{}am-et", i)
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let store = Arc::new(JsonFileStore::new(&path));
    let ledger = Ledger::open(store, serde_json::json!({"run": 1}), 5)
        .await
        .unwrap();
    ledger.append(&slug(1), record("o1")).await.unwrap();
    ledger
        .update(&slug(1), "o1", |r| {
            r.matched_size = Some(dec!(10));
            r.take_profit_order_id = Some("tp1".to_string());
            r.profit = Some(dec!(0.2));
        })
        .await
        .unwrap();
    ledger.flush().await.unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    let reopened = Ledger::open(store, serde_json::json!({"run": 2}), 5)
        .await
        .unwrap();
    let state = reopened.snapshot().await;
    assert_eq!(state.config, serde_json::json!({"run": 2}));
    let rows = state.orders.orders(&slug(1)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].take_profit_order_id.as_deref(), Some("tp1"));
    assert_eq!(rows[0].profit, Some(dec!(0.2)));
}

#[tokio::test]
async fn test_file_keeps_five_most_recent_events() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let ledger = Ledger::empty(
        Arc::new(JsonFileStore::new(&path)),
        serde_json::Value::Null,
        5,
    );

    for i in 1..=7 {
        ledger.append(&slug(i), record(&format!("o{}", i))).await.unwrap();
    }
    ledger.flush().await.unwrap();

    let state = read_state(&path).await.unwrap();
    let slugs: Vec<String> = state.orders.event_slugs().map(str::to_string).collect();
    assert_eq!(slugs, (3..=7).map(slug).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_update_refreshes_recency() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let ledger = Ledger::empty(
        Arc::new(JsonFileStore::new(&path)),
        serde_json::Value::Null,
        5,
    );

    for i in 1..=5 {
        ledger.append(&slug(i), record(&format!("o{}", i))).await.unwrap();
    }
    // Closing the oldest event's order keeps it alive past the next append
    assert!(ledger
        .update(&slug(1), "o1", |r| r.error = Some("unfilled".to_string()))
        .await
        .unwrap());
    ledger.append(&slug(6), record("o6")).await.unwrap();
    ledger.flush().await.unwrap();

    let state = read_state(&path).await.unwrap();
    let slugs: Vec<String> = state.orders.event_slugs().map(str::to_string).collect();
    assert_eq!(slugs, vec![slug(3), slug(4), slug(5), slug(1), slug(6)]);

    // Recency order survives a reload
    let reloaded = Ledger::open(
        Arc::new(JsonFileStore::new(&path)),
        serde_json::Value::Null,
        5,
    )
    .await
    .unwrap();
    reloaded.append(&slug(7), record("o7")).await.unwrap();
    let state = reloaded.snapshot().await;
    assert!(state.orders.orders(&slug(3)).is_none());
    assert!(state.orders.orders(&slug(1)).is_some());
}

#[tokio::test]
async fn test_wire_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state.json");
    let ledger = Ledger::empty(
        Arc::new(JsonFileStore::new(&path)),
        serde_json::json!({"signal": {"z_min": 1.5}}),
        5,
    );
    ledger.append(&slug(1), record("o1")).await.unwrap();
    ledger.flush().await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["config"]["signal"]["z_min"], 1.5);
    let row = &raw["orders"][slug(1)][0];
    assert_eq!(row["orderId"], "o1");
    assert_eq!(row["marketSlug"], "bitcoin-up-or-down-january-15-10am-et");
    assert_eq!(row["side"], "BUY");
    assert!(row["takeProfitOrderId"].is_null());
    assert!(row.get("takeProfitOrderId").is_some());
    assert!(row.get("matchedSize").is_none());
    assert!(row.get("error").is_none());
}

#[tokio::test]
async fn test_missing_file_is_empty_and_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let store = JsonFileStore::new(&path);
    assert!(store.load().await.unwrap().orders.is_empty());

    std::fs::write(&path, "{ not json").unwrap();
    let err = Ledger::open(Arc::new(store), serde_json::Value::Null, 5)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Decode(_)));
}

#[tokio::test]
async fn test_status_renders_persisted_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let ledger = Ledger::empty(
        Arc::new(JsonFileStore::new(&path)),
        serde_json::Value::Null,
        5,
    );
    ledger.append(&slug(1), record("o1")).await.unwrap();
    ledger
        .update(&slug(1), "o1", |r| r.error = Some("not_found".to_string()))
        .await
        .unwrap();
    ledger.flush().await.unwrap();

    let state = read_state(&path).await.unwrap();
    let out = render(&state, &path.display().to_string());
    assert!(out.contains(&slug(1)));
    assert!(out.contains("o1 BUY Up @ 0.97 size 10 matched - profit - [error: not_found]"));
}
