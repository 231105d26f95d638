//! Signal generation module
//!
//! Decides when the leading outcome of an hourly market is converging
//! toward certainty and worth buying.

mod evaluator;
pub mod threshold;
mod types;

pub use evaluator::SignalEvaluator;
pub use threshold::{default_threshold, threshold};
pub use types::{NoSignalReason, Signal};
