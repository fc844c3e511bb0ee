//! # Outcome Token AMM
//!
//! Prices buys and sells of one outcome side against that side's reserve and
//! the shared currency reserve.
//!
//! ```text
//! buy:   tokens_out   = floor(currency_in * outcome_reserve / (currency_reserve + currency_in))
//! sell:  currency_out = floor(tokens_in * currency_reserve / (outcome_reserve + tokens_in))
//! ```
//!
//! A buy grows both reserves (currency deposited, tokens minted), a sell
//! shrinks both. Price impact comes from the ratio shifting: the larger a
//! trade is relative to pool depth, the worse its average rate.
//!
//! When either side of the pool is empty there is no price signal yet and
//! buys mint at the fixed bootstrap rate instead.
//!
//! All intermediate math runs in `u128` and is narrowed back to `u64` with
//! a checked conversion. Rounding is always down, in the pool's favour.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::{Outcome, PoolReserves, TradeDirection, TradeIntent};
use crate::error::{MarketError, MarketResult};

/// Fractional digits of the currency (USDC)
pub const CURRENCY_DECIMALS: u32 = 6;

/// Fractional digits of YES/NO outcome tokens
pub const OUTCOME_TOKEN_DECIMALS: u32 = 9;

/// Outcome base units minted per currency base unit while a pool side is
/// empty: one whole USDC buys one whole outcome token.
pub const BOOTSTRAP_TOKENS_PER_CURRENCY_UNIT: u64 = 1_000;

/// Priced trade with the reserve triple it leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub direction: TradeDirection,
    pub outcome: Outcome,
    pub amount_in: u64,
    pub amount_out: u64,
    /// True when the fixed bootstrap rate was used
    pub bootstrap: bool,
    pub reserves_after: PoolReserves,
}

/// Read-only preview of a trade, for display before submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub direction: TradeDirection,
    pub outcome: Outcome,
    pub amount_in: u64,
    pub amount_out: u64,
    pub bootstrap: bool,
    /// Whole currency paid or received per whole outcome token
    pub price_per_token: Option<Decimal>,
}

impl From<Fill> for Quote {
    fn from(fill: Fill) -> Self {
        let (currency, tokens) = match fill.direction {
            TradeDirection::Buy => (fill.amount_in, fill.amount_out),
            TradeDirection::Sell => (fill.amount_out, fill.amount_in),
        };
        Self {
            direction: fill.direction,
            outcome: fill.outcome,
            amount_in: fill.amount_in,
            amount_out: fill.amount_out,
            bootstrap: fill.bootstrap,
            price_per_token: price_per_token(currency, tokens),
        }
    }
}

/// floor(a * b / c) in u128, narrowed to u64
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> MarketResult<u64> {
    if c == 0 {
        return Err(MarketError::ArithmeticOverflow);
    }
    let product = (a as u128) * (b as u128);
    u64::try_from(product / (c as u128)).map_err(|_| MarketError::ArithmeticOverflow)
}

/// Tokens minted for `currency_in` against the given reserves
pub fn tokens_for_currency(outcome_reserve: u64, currency_reserve: u64, currency_in: u64) -> MarketResult<u64> {
    if currency_in == 0 {
        return Err(MarketError::ZeroAmount);
    }
    if outcome_reserve == 0 || currency_reserve == 0 {
        let minted = (currency_in as u128) * (BOOTSTRAP_TOKENS_PER_CURRENCY_UNIT as u128);
        return u64::try_from(minted).map_err(|_| MarketError::ArithmeticOverflow);
    }
    let denominator = (currency_reserve as u128) + (currency_in as u128);
    let numerator = (currency_in as u128) * (outcome_reserve as u128);
    u64::try_from(numerator / denominator).map_err(|_| MarketError::ArithmeticOverflow)
}

/// Currency released for `tokens_in` against the given reserves
pub fn currency_for_tokens(outcome_reserve: u64, currency_reserve: u64, tokens_in: u64) -> MarketResult<u64> {
    if tokens_in == 0 {
        return Err(MarketError::ZeroAmount);
    }
    if outcome_reserve == 0 || currency_reserve == 0 {
        return Err(MarketError::NoLiquidity);
    }
    let denominator = (outcome_reserve as u128) + (tokens_in as u128);
    let numerator = (tokens_in as u128) * (currency_reserve as u128);
    u64::try_from(numerator / denominator).map_err(|_| MarketError::ArithmeticOverflow)
}

/// Price a buy and compute the reserves after it
pub fn plan_buy(reserves: PoolReserves, outcome: Outcome, currency_in: u64) -> MarketResult<Fill> {
    let outcome_reserve = reserves.outcome(outcome);
    let bootstrap = outcome_reserve == 0 || reserves.currency == 0;
    let tokens_out = tokens_for_currency(outcome_reserve, reserves.currency, currency_in)?;
    if tokens_out == 0 {
        return Err(MarketError::ZeroOutput);
    }

    let next_outcome = outcome_reserve
        .checked_add(tokens_out)
        .ok_or(MarketError::ArithmeticOverflow)?;
    let next_currency = reserves
        .currency
        .checked_add(currency_in)
        .ok_or(MarketError::ArithmeticOverflow)?;

    Ok(Fill {
        direction: TradeDirection::Buy,
        outcome,
        amount_in: currency_in,
        amount_out: tokens_out,
        bootstrap,
        reserves_after: PoolReserves { currency: next_currency, ..reserves }
            .with_outcome(outcome, next_outcome),
    })
}

/// Price a sell and compute the reserves after it
pub fn plan_sell(reserves: PoolReserves, outcome: Outcome, tokens_in: u64) -> MarketResult<Fill> {
    let outcome_reserve = reserves.outcome(outcome);
    let currency_out = currency_for_tokens(outcome_reserve, reserves.currency, tokens_in)?;
    if currency_out == 0 {
        return Err(MarketError::ZeroOutput);
    }

    // Selling more than the tracked supply means the reserve accounting is broken
    let next_outcome = outcome_reserve
        .checked_sub(tokens_in)
        .ok_or(MarketError::ArithmeticOverflow)?;
    let next_currency = reserves
        .currency
        .checked_sub(currency_out)
        .ok_or(MarketError::ArithmeticOverflow)?;

    Ok(Fill {
        direction: TradeDirection::Sell,
        outcome,
        amount_in: tokens_in,
        amount_out: currency_out,
        bootstrap: false,
        reserves_after: PoolReserves { currency: next_currency, ..reserves }
            .with_outcome(outcome, next_outcome),
    })
}

pub fn plan(reserves: PoolReserves, intent: &TradeIntent) -> MarketResult<Fill> {
    match intent.direction {
        TradeDirection::Buy => plan_buy(reserves, intent.outcome, intent.amount),
        TradeDirection::Sell => plan_sell(reserves, intent.outcome, intent.amount),
    }
}

/// Whole-currency price of one whole outcome token
pub fn price_per_token(currency_units: u64, token_units: u64) -> Option<Decimal> {
    if token_units == 0 {
        return None;
    }
    let currency = Decimal::from_i128_with_scale(currency_units as i128, CURRENCY_DECIMALS);
    let tokens = Decimal::from_i128_with_scale(token_units as i128, OUTCOME_TOKEN_DECIMALS);
    currency.checked_div(tokens).map(|p| p.round_dp(6))
}

// ============================================================================
// UNIT TESTS
// ============================================================================
