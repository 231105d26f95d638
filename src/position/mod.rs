//! Position lifecycle module
//!
//! Entry submission per hourly cycle and the hand-off of accepted entries
//! to the take-profit manager.

mod lifecycle;
mod types;

pub use lifecycle::{entry_size, CycleFlags, EntryAction, LifecycleError, LifecycleManager};
pub use types::{take_profit_queue, terminal, EntryKind, EntryOrder, TakeProfitQueue};
