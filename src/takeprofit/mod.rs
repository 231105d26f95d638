//! Take-profit module
//!
//! A poller, scheduled independently of the tick loop, that reconciles fills
//! and sells filled positions once their market has ended.

mod manager;

pub use manager::{PassSummary, TakeProfitManager, TakeProfitState};
