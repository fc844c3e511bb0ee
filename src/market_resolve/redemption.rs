// ============================================================================
// Redemption - winning tokens → pro-rata share of the pool
// ============================================================================
//
//   currency_out = floor(tokens * currency_reserve / winning_reserve)
//
// Both reserves shrink after every redemption, so each later redeemer divides
// what is left by what is still outstanding. Flooring keeps the running total
// of payouts at or below the currency reserve frozen at settlement, in any
// redemption order. Losing tokens have no claim.
//
// ============================================================================

use serde::{Deserialize, Serialize};

use super::amm::mul_div_floor;
use super::lifecycle::ensure_redeemable;
use super::market::{Market, Outcome, PoolReserves};
use crate::error::{MarketError, MarketResult};

/// A priced redemption and the market bookkeeping it leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub winning_outcome: Outcome,
    pub tokens_in: u64,
    pub currency_out: u64,
    pub reserves_after: PoolReserves,
    pub total_redeemed_after: u64,
    pub total_paid_out_after: u64,
}

/// Price a redemption of `tokens_in` winning tokens against the market's
/// remaining pool
pub fn plan_redemption(market: &Market, tokens_in: u64) -> MarketResult<Redemption> {
    let winner = ensure_redeemable(market)?;
    if tokens_in == 0 {
        return Err(MarketError::ZeroAmount);
    }

    let reserves = market.reserves();
    let winning_reserve = reserves.outcome(winner);
    if winning_reserve == 0 {
        return Err(MarketError::NoLiquidity);
    }
    let remaining_tokens = winning_reserve
        .checked_sub(tokens_in)
        .ok_or(MarketError::ArithmeticOverflow)?;

    let currency_out = mul_div_floor(tokens_in, reserves.currency, winning_reserve)?;
    let remaining_currency = reserves
        .currency
        .checked_sub(currency_out)
        .ok_or(MarketError::ArithmeticOverflow)?;

    Ok(Redemption {
        winning_outcome: winner,
        tokens_in,
        currency_out,
        reserves_after: PoolReserves { currency: remaining_currency, ..reserves }
            .with_outcome(winner, remaining_tokens),
        total_redeemed_after: market
            .total_redeemed_tokens()
            .checked_add(tokens_in)
            .ok_or(MarketError::ArithmeticOverflow)?,
        total_paid_out_after: market
            .total_paid_out()
            .checked_add(currency_out)
            .ok_or(MarketError::ArithmeticOverflow)?,
    })
}

/// Record a planned redemption on the market
pub(crate) fn apply_redemption(market: &mut Market, redemption: &Redemption) {
    market.apply_redemption(
        redemption.reserves_after,
        redemption.total_redeemed_after,
        redemption.total_paid_out_after,
    );
}
