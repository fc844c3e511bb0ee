use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{MarketError, MarketResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum project name length in bytes
pub const MAX_PROJECT_NAME_LEN: usize = 64;

/// Seed prefix mixed into every market address
pub const MARKET_SEED: &[u8] = b"market_v2";

/// Ledger owners under this prefix belong to market custody and never to a trader
pub const CUSTODY_OWNER_PREFIX: &str = "custody:";

pub type MarketId = String;

/// Ledger owner of a market's pool accounts
pub fn custody_owner(market_id: &str) -> String {
    format!("{}{}", CUSTODY_OWNER_PREFIX, market_id)
}

pub fn is_custody_owner(owner: &str) -> bool {
    owner.starts_with(CUSTODY_OWNER_PREFIX)
}

// ============================================================================
// OUTCOME / TRADE INTENT
// ============================================================================

/// Binary market outcome. No other values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "yes",
            Outcome::No => "no",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Outcome {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Outcome::Yes),
            "no" => Ok(Outcome::No),
            _ => Err(MarketError::InvalidOutcome(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A requested trade. `amount` is currency for Buy, outcome tokens for Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub direction: TradeDirection,
    pub outcome: Outcome,
    pub amount: u64,
}

impl TradeIntent {
    pub fn buy(outcome: Outcome, currency_in: u64) -> Self {
        Self { direction: TradeDirection::Buy, outcome, amount: currency_in }
    }

    pub fn sell(outcome: Outcome, tokens_in: u64) -> Self {
        Self { direction: TradeDirection::Sell, outcome, amount: tokens_in }
    }
}

// ============================================================================
// POOL RESERVES
// ============================================================================

/// The reserve triple backing a market's pricing curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolReserves {
    pub yes: u64,
    pub no: u64,
    pub currency: u64,
}

impl PoolReserves {
    pub fn outcome(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Yes => self.yes,
            Outcome::No => self.no,
        }
    }

    /// Copy with one outcome side replaced
    pub fn with_outcome(self, outcome: Outcome, value: u64) -> Self {
        match outcome {
            Outcome::Yes => Self { yes: value, ..self },
            Outcome::No => Self { no: value, ..self },
        }
    }
}

// ============================================================================
// MARKET ACCOUNT
// ============================================================================

/// Economic state of one prediction market.
///
/// Fields are private: reserves only change through the trade, settlement
/// and redemption paths in this module tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    id: MarketId,
    authority: String,
    project_name: String,
    fundraising_goal: u64,
    deadline: i64,
    yes_mint: String,
    no_mint: String,
    currency_mint: String,
    reserves: PoolReserves,
    is_settled: bool,
    winning_outcome: Option<Outcome>,
    created_at: i64,
    settled_at: Option<i64>,
    observed_result: Option<u64>,
    currency_at_settlement: Option<u64>,
    total_redeemed_tokens: u64,
    total_paid_out: u64,
    volume: u64,
}

impl Market {
    /// Deterministic market address from authority and project name
    pub fn address(authority: &str, project_name: &str) -> MarketId {
        let mut hasher = Sha256::new();
        hasher.update(MARKET_SEED);
        hasher.update(authority.as_bytes());
        hasher.update(project_name.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn validate_project_name(project_name: &str) -> MarketResult<()> {
        if project_name.is_empty() || project_name.len() > MAX_PROJECT_NAME_LEN {
            return Err(MarketError::InvalidProjectName);
        }
        Ok(())
    }

    /// Open a new market with an empty pool
    pub fn create(
        authority: &str,
        project_name: &str,
        fundraising_goal: u64,
        deadline: i64,
        now: i64,
        currency_mint: &str,
    ) -> MarketResult<Self> {
        if deadline <= now {
            return Err(MarketError::InvalidDeadline);
        }
        Self::validate_project_name(project_name)?;

        let id = Self::address(authority, project_name);
        Ok(Self {
            yes_mint: format!("{}/yes", id),
            no_mint: format!("{}/no", id),
            currency_mint: currency_mint.to_string(),
            id,
            authority: authority.to_string(),
            project_name: project_name.to_string(),
            fundraising_goal,
            deadline,
            reserves: PoolReserves::default(),
            is_settled: false,
            winning_outcome: None,
            created_at: now,
            settled_at: None,
            observed_result: None,
            currency_at_settlement: None,
            total_redeemed_tokens: 0,
            total_paid_out: 0,
            volume: 0,
        })
    }

    // ----- accessors -----

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn fundraising_goal(&self) -> u64 {
        self.fundraising_goal
    }

    pub fn deadline(&self) -> i64 {
        self.deadline
    }

    pub fn yes_mint(&self) -> &str {
        &self.yes_mint
    }

    pub fn no_mint(&self) -> &str {
        &self.no_mint
    }

    pub fn currency_mint(&self) -> &str {
        &self.currency_mint
    }

    /// Owner of the custody accounts mirroring this market's reserves
    pub fn custody_owner(&self) -> String {
        custody_owner(&self.id)
    }

    pub fn mint_for(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Yes => &self.yes_mint,
            Outcome::No => &self.no_mint,
        }
    }

    pub fn reserves(&self) -> PoolReserves {
        self.reserves
    }

    pub fn yes_reserve(&self) -> u64 {
        self.reserves.yes
    }

    pub fn no_reserve(&self) -> u64 {
        self.reserves.no
    }

    pub fn currency_reserve(&self) -> u64 {
        self.reserves.currency
    }

    pub fn is_settled(&self) -> bool {
        self.is_settled
    }

    pub fn winning_outcome(&self) -> Option<Outcome> {
        self.winning_outcome
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn settled_at(&self) -> Option<i64> {
        self.settled_at
    }

    pub fn observed_result(&self) -> Option<u64> {
        self.observed_result
    }

    /// Currency reserve frozen at the moment of settlement
    pub fn currency_at_settlement(&self) -> Option<u64> {
        self.currency_at_settlement
    }

    pub fn total_redeemed_tokens(&self) -> u64 {
        self.total_redeemed_tokens
    }

    pub fn total_paid_out(&self) -> u64 {
        self.total_paid_out
    }

    /// Currency moved through buys and sells
    pub fn volume(&self) -> u64 {
        self.volume
    }

    // ----- crate-private mutators: callers precompute everything -----

    pub(crate) fn apply_trade(&mut self, reserves: PoolReserves, volume: u64) {
        self.reserves = reserves;
        self.volume = volume;
    }

    pub(crate) fn apply_settlement(&mut self, winner: Outcome, observed_result: u64, now: i64) {
        self.is_settled = true;
        self.winning_outcome = Some(winner);
        self.settled_at = Some(now);
        self.observed_result = Some(observed_result);
        self.currency_at_settlement = Some(self.reserves.currency);
    }

    pub(crate) fn apply_redemption(&mut self, reserves: PoolReserves, redeemed_tokens: u64, paid_out: u64) {
        self.reserves = reserves;
        self.total_redeemed_tokens = redeemed_tokens;
        self.total_paid_out = paid_out;
    }

    // ----- account encoding -----

    /// Binary account image of this market
    pub fn to_account_bytes(&self) -> MarketResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| MarketError::CorruptAccount(e.to_string()))
    }

    /// Decode and validate an account image
    pub fn from_account_bytes(bytes: &[u8]) -> MarketResult<Self> {
        let market: Market =
            bincode::deserialize(bytes).map_err(|e| MarketError::CorruptAccount(e.to_string()))?;

        if Self::validate_project_name(&market.project_name).is_err() {
            return Err(MarketError::CorruptAccount("project name out of bounds".into()));
        }
        if market.is_settled != market.winning_outcome.is_some() {
            return Err(MarketError::CorruptAccount(
                "settlement flag disagrees with winning outcome".into(),
            ));
        }
        Ok(market)
    }
}
