//! Price position and short-term trend of the underlying within the hour

use super::GateDecision;
use crate::market::Outcome;
use crate::volatility::Candle;

/// Where the latest close sits between the hour open (0) and the extreme
/// reached in the signal direction (1). Zero range gives 0.
pub fn price_position(candles: &[Candle], direction: Outcome) -> Option<f64> {
    let first = candles.first()?;
    let last = candles.last()?;
    let open = first.open;

    let (range, progress) = match direction {
        Outcome::Up => {
            let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            (high - open, last.close - open)
        }
        Outcome::Down => {
            let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            (open - low, open - last.close)
        }
    };

    if range <= 0.0 {
        return Some(0.0);
    }
    Some(progress / range)
}

/// Time-weighted move of the last `count` candles. Later candles weigh more;
/// weights 1..=n are scaled so they sum to n.
pub fn weighted_trend(candles: &[Candle], count: usize) -> f64 {
    let start = candles.len().saturating_sub(count);
    let recent = &candles[start..];
    let n = recent.len();
    if n == 0 {
        return 0.0;
    }

    let weight_sum = (n * (n + 1) / 2) as f64;
    recent
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let weight = (i + 1) as f64 * n as f64 / weight_sum;
            weight * (c.close - c.open)
        })
        .sum()
}

/// Reject when the move has retraced toward the open, or when the latest
/// candles run against the signal harder than the net move since the open.
pub fn check_trend(
    candles: &[Candle],
    direction: Outcome,
    position_threshold: f64,
    trend_candles: usize,
) -> GateDecision {
    let Some(position) = price_position(candles, direction) else {
        return GateDecision::reject("no candles for the hour");
    };
    if position < position_threshold {
        return GateDecision::reject(format!(
            "price position {:.3} below {:.3}",
            position, position_threshold
        ));
    }

    let trend = weighted_trend(candles, trend_candles);
    let net_move = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (last.close - first.open).abs(),
        _ => 0.0,
    };
    let opposes = match direction {
        Outcome::Up => trend < 0.0,
        Outcome::Down => trend > 0.0,
    };
    if opposes && trend.abs() > net_move {
        return GateDecision::reject(format!(
            "trend {:.4} opposes {} beyond net move {:.4}",
            trend, direction, net_move
        ));
    }

    GateDecision::allow(format!("position {:.3}, trend {:.4}", position, trend))
}
