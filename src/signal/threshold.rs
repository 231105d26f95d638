//! Minimum acceptable entry price as a function of time to expiry

use crate::config::ThresholdParams;
use rust_decimal::Decimal;

/// Horizon over which the threshold curve is defined
pub const THRESHOLD_HORIZON_SECS: i64 = 600;

/// `round(a + b * (clamp(remaining, 0, 600) / 600)^k, 3)`
///
/// The bar is lowest at expiry and rises toward `a + b` ten minutes out.
pub fn threshold(remaining_secs: i64, params: &ThresholdParams) -> Decimal {
    let clamped = remaining_secs.clamp(0, THRESHOLD_HORIZON_SECS) as f64;
    let ratio = clamped / THRESHOLD_HORIZON_SECS as f64;
    let value = params.a + params.b * ratio.powf(params.k);
    Decimal::try_from(value)
        .map(|d| d.round_dp(3))
        .unwrap_or_else(|_| Decimal::ONE)
}

/// Threshold with the default curve (k = 0.3, a = 0.92, b = 0.06)
pub fn default_threshold(remaining_secs: i64) -> Decimal {
    threshold(remaining_secs, &ThresholdParams::default())
}
