//! Event slug templating
//!
//! Hourly events are named after the local hour they cover, e.g.
//! `bitcoin-up-or-down-january-15-10am-et` for 10:00-11:00 New York time.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Substitute `{year}`, `{month}`, `{day}`, `{hour}` and `{ampm}` for the
/// hour containing `now` in `tz`
pub fn render_slug(template: &str, now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    let (is_pm, hour12) = local.hour12();
    let month = MONTHS[local.month0() as usize];

    template
        .replace("{year}", &local.year().to_string())
        .replace("{month}", month)
        .replace("{day}", &local.day().to_string())
        .replace("{hour}", &hour12.to_string())
        .replace("{ampm}", if is_pm { "pm" } else { "am" })
}
