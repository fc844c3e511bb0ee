// Request and response models for the market API

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::market_resolve::{Market, MarketPhase, Outcome, TradeDirection};

// ===== REQUESTS =====

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMarketRequest {
    pub authority: String,
    pub project_name: String,
    pub fundraising_goal: u64,
    pub deadline: i64,
}

/// Buy, sell and quote share one shape. `amount` is currency for buys and
/// outcome tokens for sells.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub trader: String,
    pub outcome: Outcome,
    pub amount: u64,
    #[serde(default)]
    pub min_out: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub direction: TradeDirection,
    pub outcome: Outcome,
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    pub caller: String,
    pub observed_result: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub holder: String,
    pub amount: u64,
}

// ===== VIEWS =====

/// Implied odds from the outcome reserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpliedOdds {
    pub yes: Decimal,
    pub no: Decimal,
}

impl ImpliedOdds {
    /// `yes_reserve / (yes_reserve + no_reserve)`, even odds on an empty pool
    pub fn from_reserves(yes_reserve: u64, no_reserve: u64) -> Self {
        let total = yes_reserve as u128 + no_reserve as u128;
        if total == 0 {
            return Self { yes: dec!(0.5), no: dec!(0.5) };
        }
        let yes = (Decimal::from(yes_reserve) / Decimal::from(total)).round_dp(4);
        Self { yes, no: Decimal::ONE - yes }
    }
}

/// Everything a dashboard shows about one market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketView {
    pub id: String,
    pub authority: String,
    pub project_name: String,
    pub fundraising_goal: u64,
    pub deadline: i64,
    pub seconds_remaining: i64,
    pub phase: MarketPhase,
    pub yes_mint: String,
    pub no_mint: String,
    pub currency_mint: String,
    pub yes_reserve: u64,
    pub no_reserve: u64,
    pub currency_reserve: u64,
    pub is_settled: bool,
    pub winning_outcome: Option<Outcome>,
    pub observed_result: Option<u64>,
    pub odds: ImpliedOdds,
    pub volume: u64,
    pub total_paid_out: u64,
    pub created_at: i64,
}

impl MarketView {
    pub fn new(market: &Market, now: i64) -> Self {
        Self {
            id: market.id().to_string(),
            authority: market.authority().to_string(),
            project_name: market.project_name().to_string(),
            fundraising_goal: market.fundraising_goal(),
            deadline: market.deadline(),
            seconds_remaining: (market.deadline() - now).max(0),
            phase: MarketPhase::of(market),
            yes_mint: market.yes_mint().to_string(),
            no_mint: market.no_mint().to_string(),
            currency_mint: market.currency_mint().to_string(),
            yes_reserve: market.yes_reserve(),
            no_reserve: market.no_reserve(),
            currency_reserve: market.currency_reserve(),
            is_settled: market.is_settled(),
            winning_outcome: market.winning_outcome(),
            observed_result: market.observed_result(),
            odds: ImpliedOdds::from_reserves(market.yes_reserve(), market.no_reserve()),
            volume: market.volume(),
            total_paid_out: market.total_paid_out(),
            created_at: market.created_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}
