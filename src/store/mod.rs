//! State persistence module
//!
//! The order ledger lives in memory behind [`Ledger`] and is rewritten
//! wholesale to a [`StateStore`] after every mutation.

mod json;
mod ledger;

pub use json::{read_state, JsonFileStore};
pub use ledger::{OrderLedger, OrderRecord, PersistedState};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("state write failed: {0}")]
    Write(String),
    #[error("state writer stopped")]
    Closed,
}

/// Durable storage for the persisted state blob
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored state, empty when nothing was stored yet
    async fn load(&self) -> Result<PersistedState, StoreError>;
    /// Replace the stored state. May complete asynchronously; see [`StateStore::flush`].
    async fn save(&self, state: PersistedState) -> Result<(), StoreError>;
    /// Wait until every accepted save is durable
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: std::sync::Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last saved state
    pub fn saved(&self) -> Option<PersistedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PersistedState, StoreError> {
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, state: PersistedState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
        Ok(())
    }
}

/// Shared handle to the order ledger
#[derive(Clone)]
pub struct Ledger {
    state: Arc<Mutex<PersistedState>>,
    store: Arc<dyn StateStore>,
    capacity: usize,
}

impl Ledger {
    /// Load the ledger from `store`, replacing the stored config snapshot
    /// with `config` and truncating to `capacity` events
    pub async fn open(
        store: Arc<dyn StateStore>,
        config: serde_json::Value,
        capacity: usize,
    ) -> Result<Self, StoreError> {
        let mut state = store.load().await?;
        state.config = config;
        state.orders.truncate(capacity);
        Ok(Self::from_state(store, state, capacity))
    }

    /// Start from an empty ledger
    pub fn empty(store: Arc<dyn StateStore>, config: serde_json::Value, capacity: usize) -> Self {
        let state = PersistedState {
            config,
            orders: OrderLedger::new(),
        };
        Self::from_state(store, state, capacity)
    }

    fn from_state(store: Arc<dyn StateStore>, state: PersistedState, capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            capacity,
        }
    }

    /// Append an order row and persist
    pub async fn append(&self, event_slug: &str, record: OrderRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.orders.append(event_slug, record, self.capacity);
        self.store.save(state.clone()).await
    }

    /// Update an order row and persist. Returns `Ok(false)` when the row was
    /// already evicted, in which case nothing is written.
    pub async fn update<F>(&self, event_slug: &str, order_id: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut OrderRecord),
    {
        let mut state = self.state.lock().await;
        if !state.orders.update(event_slug, order_id, f) {
            return Ok(false);
        }
        self.store.save(state.clone()).await?;
        Ok(true)
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }

    /// Wait for pending writes
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.store.flush().await
    }
}
