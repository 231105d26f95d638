//! Price/volatility ladder for extra entries
//!
//! The lower the price, the later in the hour and the more the underlying
//! must have moved before more capital goes in.

use super::GateDecision;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One rung of the ladder. All conditions must hold.
#[derive(Debug, Clone, Copy)]
struct Rung {
    min_price: Decimal,
    min_minute: u32,
    min_amp: f64,
    needs_seller_liquidity: bool,
}

const RUNGS: [Rung; 3] = [
    Rung {
        min_price: dec!(0.99),
        min_minute: 0,
        min_amp: 0.002,
        needs_seller_liquidity: false,
    },
    Rung {
        min_price: dec!(0.98),
        min_minute: 55,
        min_amp: 0.004,
        needs_seller_liquidity: false,
    },
    Rung {
        min_price: dec!(0.97),
        min_minute: 57,
        min_amp: 0.008,
        needs_seller_liquidity: true,
    },
];

/// Market conditions the ladder is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct LadderInput {
    pub price: Decimal,
    /// Wall-clock minute of the hour
    pub minute: u32,
    /// One-hour amplitude of the underlying
    pub amp: f64,
    /// Ask depth at or below 0.99 on the candidate token
    pub seller_liquidity: Decimal,
    pub min_seller_liquidity: Decimal,
}

/// Pass if any rung holds
pub fn check_ladder(input: &LadderInput) -> GateDecision {
    let hit = RUNGS.iter().find(|rung| {
        input.price >= rung.min_price
            && input.minute >= rung.min_minute
            && input.amp >= rung.min_amp
            && (!rung.needs_seller_liquidity || input.seller_liquidity >= input.min_seller_liquidity)
    });

    match hit {
        Some(rung) => GateDecision::allow(format!(
            "ladder rung {} (amp {:.4})",
            rung.min_price, input.amp
        )),
        None => GateDecision::reject(format!(
            "no ladder rung for price {} at minute {} (amp {:.4}, sellers {})",
            input.price, input.minute, input.amp, input.seller_liquidity
        )),
    }
}
