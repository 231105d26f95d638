//! Divergence and amplitude statistics over 1-minute candles

use super::Candle;

/// Standard deviation of 1-minute log returns between consecutive closes
pub fn realized_sigma(candles: &[Candle]) -> Option<f64> {
    let returns: Vec<f64> = candles
        .windows(2)
        .filter(|w| w[0].close > 0.0 && w[1].close > 0.0)
        .map(|w| (w[1].close / w[0].close).ln())
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Divergence of `last` from `reference_open`, in units of the volatility
/// expected over the remaining horizon:
/// `|ln(last / open)| / (sigma_1m * sqrt(remaining_minutes))`
pub fn divergence_z(reference_open: f64, last: f64, sigma_1m: f64, remaining_secs: i64) -> Option<f64> {
    if reference_open <= 0.0 || last <= 0.0 || sigma_1m <= 0.0 {
        return None;
    }
    let remaining_minutes = (remaining_secs.max(1) as f64) / 60.0;
    let expected_move = sigma_1m * remaining_minutes.sqrt();
    Some((last / reference_open).ln().abs() / expected_move)
}

/// `(max high - min low) / first open` over the candles
pub fn amplitude(candles: &[Candle]) -> Option<f64> {
    let first = candles.first()?;
    if first.open <= 0.0 {
        return None;
    }
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    Some((high - low) / first.open)
}
