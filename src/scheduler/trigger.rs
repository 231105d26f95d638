//! Wall-clock trigger: a cron schedule bound to a timezone

use super::{sleep_or_shutdown, CronError, CronSchedule};
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;

/// Fires at the minutes matched by a cron expression in an IANA timezone
#[derive(Debug, Clone)]
pub struct Trigger {
    schedule: CronSchedule,
    tz: Tz,
}

impl Trigger {
    pub fn new(schedule: CronSchedule, tz: Tz) -> Self {
        Self { schedule, tz }
    }

    /// Parse an expression and timezone name
    pub fn parse(expression: &str, tz: Tz) -> Result<Self, CronError> {
        Ok(Self::new(CronSchedule::parse(expression)?, tz))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Whether the minute containing `now` is a firing minute
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.matches(&now.with_timezone(&self.tz))
    }

    /// Next firing minute strictly after `now`
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.next_after(now, &self.tz)
    }

    /// Wait until the trigger fires. Returns immediately when the current
    /// minute already matches. Returns `false` if shutdown was requested.
    pub async fn wait(&self, clock: &dyn Clock, shutdown: &mut watch::Receiver<bool>) -> bool {
        if self.is_due(clock.now()) {
            return !*shutdown.borrow();
        }
        self.wait_next(clock, shutdown).await
    }

    /// Wait for the next firing minute strictly after now, even when the
    /// current minute matches. Returns `false` if shutdown was requested.
    pub async fn wait_next(&self, clock: &dyn Clock, shutdown: &mut watch::Receiver<bool>) -> bool {
        let now = clock.now();
        let Some(next) = self.next_fire(now) else {
            tracing::error!(
                expression = self.schedule.expression(),
                "Cron expression never fires, trigger parked"
            );
            let _ = shutdown.wait_for(|stop| *stop).await;
            return false;
        };

        let delay = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next = %next, delay_secs = delay.as_secs(), "Trigger armed");
        sleep_or_shutdown(delay, shutdown).await
    }
}
