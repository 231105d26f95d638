//! Five-field cron expressions
//!
//! `minute hour day-of-month month day-of-week`, parsed and evaluated by
//! `croner`. Seconds are not accepted; a schedule matches whole minutes.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use croner::Cron;
use thiserror::Error;

/// Cron parse errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid cron expression '{expression}': {reason}")]
    Invalid { expression: String, reason: String },
}

/// A parsed cron expression
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse a five-field cron expression
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields = expression.split_whitespace().count();
        if fields != 5 {
            return Err(CronError::FieldCount(fields));
        }

        let cron = Cron::new(expression)
            .parse()
            .map_err(|e| CronError::Invalid {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    /// The original expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the minute containing `at` matches, evaluated in `at`'s zone
    pub fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let minute = at
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(|| at.clone());
        self.cron.is_time_matching(&minute).unwrap_or(false)
    }

    /// First minute strictly after `after` that matches in `tz`
    pub fn next_after<Tz: TimeZone>(&self, after: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        self.cron
            .find_next_occurrence(&after.with_timezone(tz), false)
            .ok()
            .map(|next| next.with_timezone(&Utc))
    }
}
