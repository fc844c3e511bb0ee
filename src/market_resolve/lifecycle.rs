use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::market::{Market, Outcome};
use crate::error::{MarketError, MarketResult};

// ============================================================================
// MARKET PHASE
// ============================================================================

/// Market lifecycle
///
/// Flow: Open → Settled (terminal, no way back)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPhase {
    /// Trading allowed until the deadline, settlement allowed after it
    Open,
    /// Outcome fixed, reserves frozen for redemption
    Settled,
}

impl MarketPhase {
    pub fn of(market: &Market) -> Self {
        if market.is_settled() {
            MarketPhase::Settled
        } else {
            MarketPhase::Open
        }
    }
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketPhase::Open => write!(f, "open"),
            MarketPhase::Settled => write!(f, "settled"),
        }
    }
}

// ============================================================================
// SETTLEMENT POLICY
// ============================================================================

/// How the observed fundraising result is compared against the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalComparator {
    /// YES wins when `observed >= goal`
    #[default]
    Gte,
    /// YES wins only when `observed > goal`
    Gt,
}

impl FromStr for GoalComparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gte" | ">=" => Ok(GoalComparator::Gte),
            "gt" | ">" => Ok(GoalComparator::Gt),
            other => Err(format!("unknown goal comparator: {}", other)),
        }
    }
}

/// Decides the winning side at settlement.
///
/// The observed result is reported by the market authority; the engine has
/// no oracle and takes the figure on trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementPolicy {
    pub comparator: GoalComparator,
}

impl SettlementPolicy {
    pub fn new(comparator: GoalComparator) -> Self {
        Self { comparator }
    }

    pub fn decide(&self, observed_result: u64, fundraising_goal: u64) -> Outcome {
        let goal_met = match self.comparator {
            GoalComparator::Gte => observed_result >= fundraising_goal,
            GoalComparator::Gt => observed_result > fundraising_goal,
        };
        if goal_met {
            Outcome::Yes
        } else {
            Outcome::No
        }
    }
}

// ============================================================================
// GATES
// ============================================================================

/// Buy and sell are only legal while open and before the deadline
pub fn ensure_trading_open(market: &Market, now: i64) -> MarketResult<()> {
    if market.is_settled() {
        return Err(MarketError::MarketSettled);
    }
    if now >= market.deadline() {
        return Err(MarketError::DeadlinePassed);
    }
    Ok(())
}

/// Winning outcome of a settled market
pub fn ensure_redeemable(market: &Market) -> MarketResult<Outcome> {
    match (market.is_settled(), market.winning_outcome()) {
        (true, Some(winner)) => Ok(winner),
        _ => Err(MarketError::MarketNotSettled),
    }
}

/// Latch the market into `Settled`.
///
/// The latch is checked before the deadline so that a repeated call always
/// reports `AlreadySettled`, whatever the clock says.
pub fn settle(
    market: &mut Market,
    caller: &str,
    observed_result: u64,
    now: i64,
    policy: &SettlementPolicy,
) -> MarketResult<Outcome> {
    if caller != market.authority() {
        return Err(MarketError::Unauthorized);
    }
    if market.is_settled() {
        return Err(MarketError::AlreadySettled);
    }
    if now < market.deadline() {
        return Err(MarketError::DeadlineNotPassed);
    }

    let winner = policy.decide(observed_result, market.fundraising_goal());
    market.apply_settlement(winner, observed_result, now);
    Ok(winner)
}
