use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::amm::{self, Fill, Quote};
use super::lifecycle::{self, SettlementPolicy};
use super::market::{is_custody_owner, Market, MarketId, Outcome, PoolReserves, TradeDirection, TradeIntent};
use super::redemption::{self, Redemption};
use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::ledger::{Journal, Ledger, LedgerError, TokenLedger};

// Market engine
// Owns every market, moves balances on the token ledger, and runs each
// operation as a single all-or-nothing step

/// Executed buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub tx_id: String,
    pub market_id: MarketId,
    pub trader: String,
    pub fill: Fill,
    pub timestamp: i64,
}

/// Executed redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub tx_id: String,
    pub market_id: MarketId,
    pub holder: String,
    pub redemption: Redemption,
    pub timestamp: i64,
}

/// A holder's balances in one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub holder: String,
    pub yes: u64,
    pub no: u64,
    pub currency: u64,
    /// Currency the holder would receive redeeming all winning tokens now
    pub redeemable_value: Option<u64>,
}

/// Pool reserves next to the custody balances that must mirror them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySnapshot {
    pub reserves: PoolReserves,
    pub custody: PoolReserves,
}

impl CustodySnapshot {
    pub fn is_consistent(&self) -> bool {
        self.reserves == self.custody
    }
}

pub struct MarketManager<L: TokenLedger = Ledger> {
    markets: HashMap<MarketId, Market>,
    ledger: L,
    clock: Arc<dyn Clock>,
    policy: SettlementPolicy,
    currency_mint: String,
}

/// Balance of a token account, treating a missing account as empty
fn held<L: TokenLedger>(ledger: &L, mint: &str, owner: &str) -> MarketResult<u64> {
    match ledger.balance_of(mint, owner) {
        Ok(balance) => Ok(balance),
        Err(LedgerError::AccountNotFound(_)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Traders and holders may never act as a custody account
fn ensure_not_custody(owner: &str) -> MarketResult<()> {
    if is_custody_owner(owner) {
        return Err(MarketError::ReservedAccount(owner.to_string()));
    }
    Ok(())
}

fn ensure_holds(available: u64, requested: u64) -> MarketResult<()> {
    if available < requested {
        return Err(MarketError::InsufficientBalance { available, requested });
    }
    Ok(())
}

impl<L: TokenLedger> MarketManager<L> {
    pub fn new(
        ledger: L,
        clock: Arc<dyn Clock>,
        policy: SettlementPolicy,
        currency_mint: impl Into<String>,
    ) -> Self {
        Self {
            markets: HashMap::new(),
            ledger,
            clock,
            policy,
            currency_mint: currency_mint.into(),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn currency_mint(&self) -> &str {
        &self.currency_mint
    }

    pub fn market(&self, market_id: &str) -> MarketResult<&Market> {
        self.markets
            .get(market_id)
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))
    }

    /// All markets, newest first
    pub fn markets(&self) -> Vec<&Market> {
        let mut markets: Vec<&Market> = self.markets.values().collect();
        markets.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(b.id())));
        markets
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    pub fn create_market(
        &mut self,
        authority: &str,
        project_name: &str,
        fundraising_goal: u64,
        deadline: i64,
    ) -> MarketResult<MarketId> {
        let market = Market::create(
            authority,
            project_name,
            fundraising_goal,
            deadline,
            self.clock.now(),
            &self.currency_mint,
        )?;
        let id = market.id().to_string();
        if self.markets.contains_key(&id) {
            return Err(MarketError::MarketAlreadyExists(id));
        }

        let custody = market.custody_owner();
        for mint in [market.yes_mint(), market.no_mint(), market.currency_mint()] {
            self.ledger.open_account(mint, &custody);
        }

        info!(
            market_id = %id,
            project = project_name,
            goal = fundraising_goal,
            deadline,
            "market created"
        );
        self.markets.insert(id.clone(), market);
        Ok(id)
    }

    // ========================================================================
    // TRADE
    // ========================================================================

    pub fn buy(&mut self, market_id: &str, buyer: &str, outcome: Outcome, currency_in: u64) -> MarketResult<u64> {
        let receipt = self.execute(market_id, buyer, &TradeIntent::buy(outcome, currency_in), None)?;
        Ok(receipt.fill.amount_out)
    }

    pub fn sell(&mut self, market_id: &str, seller: &str, outcome: Outcome, tokens_in: u64) -> MarketResult<u64> {
        let receipt = self.execute(market_id, seller, &TradeIntent::sell(outcome, tokens_in), None)?;
        Ok(receipt.fill.amount_out)
    }

    /// Preview a trade without executing it
    pub fn quote(&self, market_id: &str, intent: &TradeIntent) -> MarketResult<Quote> {
        let market = self.market(market_id)?;
        lifecycle::ensure_trading_open(market, self.clock.now())?;
        amm::plan(market.reserves(), intent).map(Quote::from)
    }

    /// Execute a trade, optionally refusing it when the output would fall
    /// below `min_out`
    pub fn execute(
        &mut self,
        market_id: &str,
        trader: &str,
        intent: &TradeIntent,
        min_out: Option<u64>,
    ) -> MarketResult<TradeReceipt> {
        ensure_not_custody(trader)?;
        let now = self.clock.now();
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))?;
        lifecycle::ensure_trading_open(market, now)?;

        let outcome_mint = market.mint_for(intent.outcome).to_string();
        let currency_mint = market.currency_mint().to_string();
        let custody = market.custody_owner();

        if intent.direction == TradeDirection::Sell {
            ensure_holds(held(&self.ledger, &outcome_mint, trader)?, intent.amount)?;
        }

        let fill = amm::plan(market.reserves(), intent)?;
        if let Some(min_out) = min_out {
            if fill.amount_out < min_out {
                return Err(MarketError::SlippageExceeded { min_out, actual: fill.amount_out });
            }
        }

        let currency_leg = match fill.direction {
            TradeDirection::Buy => fill.amount_in,
            TradeDirection::Sell => fill.amount_out,
        };
        let volume = market
            .volume()
            .checked_add(currency_leg)
            .ok_or(MarketError::ArithmeticOverflow)?;

        match fill.direction {
            TradeDirection::Buy => {
                ensure_holds(self.ledger.balance_of(&currency_mint, trader)?, fill.amount_in)?;

                let mut journal = Journal::new(&mut self.ledger);
                journal.open_account(&outcome_mint, trader);
                journal.transfer(&currency_mint, trader, &custody, fill.amount_in)?;
                journal.mint_to(&outcome_mint, trader, fill.amount_out)?;
                journal.mint_to(&outcome_mint, &custody, fill.amount_out)?;
                journal.commit();
            }
            TradeDirection::Sell => {
                let mut journal = Journal::new(&mut self.ledger);
                journal.open_account(&currency_mint, trader);
                journal.burn_from(&outcome_mint, trader, fill.amount_in)?;
                journal.burn_from(&outcome_mint, &custody, fill.amount_in)?;
                journal.transfer(&currency_mint, &custody, trader, fill.amount_out)?;
                journal.commit();
            }
        }

        market.apply_trade(fill.reserves_after, volume);

        info!(
            market_id,
            trader,
            direction = ?fill.direction,
            outcome = %fill.outcome,
            amount_in = fill.amount_in,
            amount_out = fill.amount_out,
            bootstrap = fill.bootstrap,
            "trade executed"
        );
        debug!(market_id, reserves = ?fill.reserves_after, "reserves updated");

        Ok(TradeReceipt {
            tx_id: uuid::Uuid::new_v4().to_string(),
            market_id: market_id.to_string(),
            trader: trader.to_string(),
            fill,
            timestamp: now,
        })
    }

    // ========================================================================
    // SETTLE
    // ========================================================================

    /// Authority-only. The observed result is taken as reported.
    pub fn settle(&mut self, market_id: &str, caller: &str, observed_result: u64) -> MarketResult<Outcome> {
        let now = self.clock.now();
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))?;

        let winner = lifecycle::settle(market, caller, observed_result, now, &self.policy)?;

        info!(
            market_id,
            goal = market.fundraising_goal(),
            observed_result,
            winner = %winner,
            currency_reserve = market.currency_reserve(),
            "market settled"
        );
        Ok(winner)
    }

    // ========================================================================
    // REDEEM
    // ========================================================================

    pub fn redeem(&mut self, market_id: &str, holder: &str, amount: u64) -> MarketResult<u64> {
        Ok(self.redeem_with_receipt(market_id, holder, amount)?.redemption.currency_out)
    }

    pub fn redeem_with_receipt(
        &mut self,
        market_id: &str,
        holder: &str,
        amount: u64,
    ) -> MarketResult<RedemptionReceipt> {
        ensure_not_custody(holder)?;
        let now = self.clock.now();
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))?;

        let winner = lifecycle::ensure_redeemable(market)?;
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let winning_mint = market.mint_for(winner).to_string();
        let currency_mint = market.currency_mint().to_string();
        let custody = market.custody_owner();
        ensure_holds(held(&self.ledger, &winning_mint, holder)?, amount)?;

        let planned = redemption::plan_redemption(market, amount)?;

        let mut journal = Journal::new(&mut self.ledger);
        journal.open_account(&currency_mint, holder);
        journal.burn_from(&winning_mint, holder, amount)?;
        journal.burn_from(&winning_mint, &custody, amount)?;
        journal.transfer(&currency_mint, &custody, holder, planned.currency_out)?;
        journal.commit();

        redemption::apply_redemption(market, &planned);

        info!(
            market_id,
            holder,
            tokens = amount,
            currency_out = planned.currency_out,
            "winning tokens redeemed"
        );

        Ok(RedemptionReceipt {
            tx_id: uuid::Uuid::new_v4().to_string(),
            market_id: market_id.to_string(),
            holder: holder.to_string(),
            redemption: planned,
            timestamp: now,
        })
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    pub fn position(&self, market_id: &str, holder: &str) -> MarketResult<Position> {
        let market = self.market(market_id)?;
        let yes = held(&self.ledger, market.yes_mint(), holder)?;
        let no = held(&self.ledger, market.no_mint(), holder)?;
        let currency = held(&self.ledger, market.currency_mint(), holder)?;

        let redeemable_value = match market.winning_outcome() {
            Some(winner) => {
                let winning = if winner == Outcome::Yes { yes } else { no };
                if winning == 0 {
                    Some(0)
                } else {
                    redemption::plan_redemption(market, winning).ok().map(|r| r.currency_out)
                }
            }
            None => None,
        };

        Ok(Position {
            market_id: market_id.to_string(),
            holder: holder.to_string(),
            yes,
            no,
            currency,
            redeemable_value,
        })
    }

    pub fn custody(&self, market_id: &str) -> MarketResult<CustodySnapshot> {
        let market = self.market(market_id)?;
        let custody = market.custody_owner();
        Ok(CustodySnapshot {
            reserves: market.reserves(),
            custody: PoolReserves {
                yes: held(&self.ledger, market.yes_mint(), &custody)?,
                no: held(&self.ledger, market.no_mint(), &custody)?,
                currency: held(&self.ledger, market.currency_mint(), &custody)?,
            },
        })
    }

    /// Fails when a custody balance has drifted from its reserve counter
    pub fn check_custody(&self, market_id: &str) -> MarketResult<()> {
        let snapshot = self.custody(market_id)?;
        if !snapshot.is_consistent() {
            return Err(MarketError::CorruptAccount(format!(
                "custody {:?} does not match reserves {:?}",
                snapshot.custody, snapshot.reserves
            )));
        }
        Ok(())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
