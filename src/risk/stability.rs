//! Directional stability of the candidate outcome's price
//!
//! Samples far from 0.5 on the favoured side count slightly more, samples on
//! the wrong side slightly less, so a price that has sat firmly on one side of
//! the book scores above its plain mean.

use super::GateDecision;
use crate::config::RiskConfig;
use chrono::{DateTime, TimeZone, Timelike};

/// Maximum weight adjustment at p = 0 or p = 1
const WEIGHT_SPREAD: f64 = 0.1;

/// Distance weight of one price sample
pub fn sample_weight(p: f64) -> f64 {
    let distance = ((p - 0.5).abs() / 0.5).powi(2);
    if p >= 0.5 {
        1.0 + WEIGHT_SPREAD * distance
    } else {
        1.0 - WEIGHT_SPREAD * distance
    }
}

/// Mean of `p * weight(p)`, `None` for an empty sample set
pub fn weighted_average(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    let sum: f64 = prices.iter().map(|&p| p * sample_weight(p)).sum();
    Some(sum / prices.len() as f64)
}

/// Boost applied in the last minutes of the hour
pub fn late_boost(minute: u32, config: &RiskConfig) -> f64 {
    let past = minute.saturating_sub(config.late_boost_start_minute);
    (past as f64 * config.late_boost_per_minute).min(config.late_boost_cap)
}

/// Stability score after dampening and late boost
pub fn stability_score<Tz: TimeZone>(
    prices: &[f64],
    local_now: &DateTime<Tz>,
    config: &RiskConfig,
) -> Option<f64> {
    let mut score = weighted_average(prices)?;
    if config.dampened_hours.contains(&local_now.hour()) {
        score *= 1.0 - config.dampening;
    }
    Some(score + late_boost(local_now.minute(), config))
}

/// Gate on the stability score
pub fn check_stability<Tz: TimeZone>(
    prices: &[f64],
    local_now: &DateTime<Tz>,
    config: &RiskConfig,
) -> GateDecision {
    match stability_score(prices, local_now, config) {
        None => GateDecision::reject("no price history"),
        Some(score) if score < config.weighted_threshold => GateDecision::reject(format!(
            "stability {:.3} below {:.3}",
            score, config.weighted_threshold
        )),
        Some(score) => GateDecision::allow(format!("stability {:.3}", score)),
    }
}
