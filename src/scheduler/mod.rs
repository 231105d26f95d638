//! Scheduling module
//!
//! Cron triggers in an IANA timezone and the per-symbol hourly tick loop.

mod cron;
mod tick;
mod trigger;

pub use cron::{CronError, CronSchedule};
pub use tick::{ActiveLoops, TickScheduler};
pub use trigger::Trigger;

use std::time::Duration;
use tokio::sync::watch;

/// Sleep for `duration` unless shutdown is requested first.
///
/// Returns `true` when the full duration elapsed, `false` on shutdown or
/// when the shutdown sender is gone.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    let slept = tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.wait_for(|stop| *stop) => false,
    };
    slept && !*shutdown.borrow()
}
