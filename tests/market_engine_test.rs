/// Engine-level integration tests
///
/// Drive `MarketManager` through whole market lifecycles on the in-memory
/// ledger, checking the pool accounting after every step.

use std::sync::Arc;

use indie_star_market::market_resolve::{custody_owner, plan_sell, tokens_for_currency};
use indie_star_market::{
    Ledger, LedgerError, ManualClock, Market, MarketError, MarketManager, Outcome, PoolReserves,
    SettlementPolicy, TokenLedger, TradeIntent,
};

// ============================================================================
// CONSTANTS & HELPERS
// ============================================================================

const NOW: i64 = 1_700_000_000;
const DAY: i64 = 86_400;
const GOAL: u64 = 100_000;
const STARTING_USDC: u64 = 50_000_000;

const AUTHORITY: &str = "indie_artist";
const ALICE: &str = "alice";
const BOB: &str = "bob";
const CAROL: &str = "carol";

fn funded_manager<L: TokenLedger>(ledger: L) -> (MarketManager<L>, ManualClock) {
    let clock = ManualClock::new(NOW);
    let mut manager = MarketManager::new(ledger, Arc::new(clock.clone()), SettlementPolicy::default(), "USDC");
    for owner in [ALICE, BOB, CAROL] {
        manager.ledger_mut().open_account("USDC", owner);
        manager.ledger_mut().mint_to("USDC", owner, STARTING_USDC).unwrap();
    }
    (manager, clock)
}

fn setup() -> (MarketManager, ManualClock, String) {
    let (mut manager, clock) = funded_manager(Ledger::new());
    let id = manager.create_market(AUTHORITY, "Proj", GOAL, NOW + DAY).unwrap();
    (manager, clock, id)
}

fn usdc<L: TokenLedger>(manager: &MarketManager<L>, owner: &str) -> u64 {
    manager.ledger().balance_of("USDC", owner).unwrap_or(0)
}

fn tokens<L: TokenLedger>(manager: &MarketManager<L>, id: &str, outcome: Outcome, owner: &str) -> u64 {
    let mint = manager.market(id).unwrap().mint_for(outcome).to_string();
    manager.ledger().balance_of(&mint, owner).unwrap_or(0)
}

/// Ledger that refuses to mint to one owner, for exercising rollback
struct FlakyLedger {
    inner: Ledger,
    refuse_mint_to: Option<String>,
}

impl TokenLedger for FlakyLedger {
    fn open_account(&mut self, mint: &str, owner: &str) -> bool {
        self.inner.open_account(mint, owner)
    }

    fn close_account(&mut self, mint: &str, owner: &str) -> Result<(), LedgerError> {
        self.inner.close_account(mint, owner)
    }

    fn mint_to(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        if self.refuse_mint_to.as_deref() == Some(owner) {
            return Err(LedgerError::Overflow);
        }
        self.inner.mint_to(mint, owner, amount)
    }

    fn burn_from(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        self.inner.burn_from(mint, owner, amount)
    }

    fn transfer(&mut self, mint: &str, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        self.inner.transfer(mint, from, to, amount)
    }

    fn balance_of(&self, mint: &str, owner: &str) -> Result<u64, LedgerError> {
        self.inner.balance_of(mint, owner)
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_scenario_a_bootstrap_buy() {
    let (mut manager, _, id) = setup();

    let out = manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    assert_eq!(out, 1_000_000_000);
    let market = manager.market(&id).unwrap();
    assert_eq!(market.yes_reserve(), 1_000_000_000);
    assert_eq!(market.no_reserve(), 0);
    assert_eq!(market.currency_reserve(), 1_000_000);
    assert_eq!(tokens(&manager, &id, Outcome::Yes, ALICE), 1_000_000_000);
    manager.check_custody(&id).unwrap();
}

#[test]
fn test_scenario_b_second_buy_pays_price_impact() {
    let (mut manager, _, id) = setup();
    let first = manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    let second = manager.buy(&id, BOB, Outcome::Yes, 1_000_000).unwrap();

    assert_eq!(second, 500_000_000);
    assert!(second < first);
    manager.check_custody(&id).unwrap();
}

#[test]
fn test_scenario_c_sell_against_pool() {
    let reserves = PoolReserves { yes: 2_000_000_000, no: 0, currency: 1_500_000 };
    let fill = plan_sell(reserves, Outcome::Yes, 2_000_000_000).unwrap();
    assert_eq!(fill.amount_out, 750_000);
    assert!(fill.amount_out < reserves.currency);
}

#[test]
fn test_scenario_d_settlement_waits_for_deadline() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    assert_eq!(manager.settle(&id, AUTHORITY, GOAL), Err(MarketError::DeadlineNotPassed));
    assert!(!manager.market(&id).unwrap().is_settled());

    clock.advance(DAY);
    assert_eq!(manager.settle(&id, AUTHORITY, GOAL).unwrap(), Outcome::Yes);

    let market = manager.market(&id).unwrap();
    assert!(market.is_settled());
    assert_eq!(market.winning_outcome(), Some(Outcome::Yes));
    assert_eq!(market.observed_result(), Some(GOAL));
}

#[test]
fn test_scenario_e_redeem_guards() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    assert_eq!(manager.redeem(&id, ALICE, 1), Err(MarketError::MarketNotSettled));

    clock.advance(DAY);
    manager.settle(&id, AUTHORITY, GOAL).unwrap();
    assert_eq!(manager.redeem(&id, ALICE, 0), Err(MarketError::ZeroAmount));
}

// ============================================================================
// INVARIANTS
// ============================================================================

#[test]
fn test_currency_reserve_tracks_net_deposits() {
    let (mut manager, _, id) = setup();
    let mut deposited = 0u64;
    let mut withdrawn = 0u64;

    let buys = [
        (ALICE, Outcome::Yes, 1_000_000),
        (BOB, Outcome::No, 2_000_000),
        (CAROL, Outcome::Yes, 333_333),
        (ALICE, Outcome::No, 777_777),
        (BOB, Outcome::Yes, 5_000_001),
    ];
    for (trader, outcome, amount) in buys {
        manager.buy(&id, trader, outcome, amount).unwrap();
        deposited += amount;
        manager.check_custody(&id).unwrap();
    }

    for (trader, outcome) in [(ALICE, Outcome::Yes), (BOB, Outcome::No), (CAROL, Outcome::Yes)] {
        let held = tokens(&manager, &id, outcome, trader);
        withdrawn += manager.sell(&id, trader, outcome, held / 3).unwrap();
        manager.check_custody(&id).unwrap();
    }

    let market = manager.market(&id).unwrap();
    assert_eq!(market.currency_reserve(), deposited - withdrawn);

    // Currency is only moved, never created
    let total = usdc(&manager, ALICE) + usdc(&manager, BOB) + usdc(&manager, CAROL) + usdc(&manager, &custody_owner(&id));
    assert_eq!(total, 3 * STARTING_USDC);
}

#[test]
fn test_one_big_buy_gets_less_than_two_halves() {
    let (mut manager, _, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    let market = manager.market(&id).unwrap();
    let single = tokens_for_currency(market.yes_reserve(), market.currency_reserve(), 2_000_000).unwrap();

    let first_half = manager.buy(&id, BOB, Outcome::Yes, 1_000_000).unwrap();
    let second_half = manager.buy(&id, BOB, Outcome::Yes, 1_000_000).unwrap();
    assert!(single < first_half + second_half);
}

#[test]
fn test_selling_everything_never_empties_currency() {
    let (mut manager, _, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 4_000_000).unwrap();
    manager.buy(&id, BOB, Outcome::No, 1_000_000).unwrap();

    let reserve_before = manager.market(&id).unwrap().currency_reserve();
    let all_yes = tokens(&manager, &id, Outcome::Yes, ALICE);
    let out = manager.sell(&id, ALICE, Outcome::Yes, all_yes).unwrap();

    assert!(out < reserve_before);
    let market = manager.market(&id).unwrap();
    assert_eq!(market.yes_reserve(), 0);
    assert!(market.currency_reserve() > 0);
    manager.check_custody(&id).unwrap();
}

#[test]
fn test_redemptions_stay_within_settled_pool() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 3_000_000).unwrap();
    manager.buy(&id, BOB, Outcome::Yes, 1_234_567).unwrap();
    manager.buy(&id, CAROL, Outcome::Yes, 999_999).unwrap();
    manager.buy(&id, CAROL, Outcome::No, 2_500_000).unwrap();

    clock.advance(DAY + 1);
    manager.settle(&id, AUTHORITY, GOAL + 1).unwrap();
    let frozen = manager.market(&id).unwrap().currency_reserve();

    let mut paid = 0;
    for holder in [CAROL, ALICE, BOB] {
        let held = tokens(&manager, &id, Outcome::Yes, holder);
        paid += manager.redeem(&id, holder, held).unwrap();
        assert!(paid <= frozen);
        manager.check_custody(&id).unwrap();
    }

    let market = manager.market(&id).unwrap();
    assert_eq!(market.yes_reserve(), 0);
    assert_eq!(paid + market.currency_reserve(), frozen);

    // Losing tokens have no claim
    let carol_no = tokens(&manager, &id, Outcome::No, CAROL);
    assert_eq!(
        manager.redeem(&id, CAROL, carol_no),
        Err(MarketError::InsufficientBalance { available: 0, requested: carol_no })
    );
}

#[test]
fn test_settlement_is_one_way() {
    let (mut manager, clock, id) = setup();
    clock.advance(DAY);
    manager.settle(&id, AUTHORITY, 0).unwrap();

    for observed in [0, GOAL, u64::MAX] {
        assert_eq!(manager.settle(&id, AUTHORITY, observed), Err(MarketError::AlreadySettled));
    }
    clock.set(NOW);
    assert_eq!(manager.settle(&id, AUTHORITY, GOAL), Err(MarketError::AlreadySettled));
    assert_eq!(manager.market(&id).unwrap().winning_outcome(), Some(Outcome::No));
}

#[test]
fn test_trading_closes_at_deadline_even_without_settlement() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::No, 1_000_000).unwrap();

    clock.set(NOW + DAY);
    assert_eq!(manager.buy(&id, BOB, Outcome::No, 1), Err(MarketError::DeadlinePassed));
    assert_eq!(manager.sell(&id, ALICE, Outcome::No, 1), Err(MarketError::DeadlinePassed));
}

// ============================================================================
// ATOMICITY
// ============================================================================

#[test]
fn test_failed_ledger_step_rolls_back_buy() {
    let ledger = FlakyLedger { inner: Ledger::new(), refuse_mint_to: None };
    let (mut manager, _) = funded_manager(ledger);
    let id = manager.create_market(AUTHORITY, "Proj", GOAL, NOW + DAY).unwrap();

    // The custody mint is the last movement of a buy
    manager.ledger_mut().refuse_mint_to = Some(custody_owner(&id));
    let before = manager.market(&id).unwrap().clone();

    assert_eq!(
        manager.buy(&id, ALICE, Outcome::Yes, 1_000_000),
        Err(MarketError::ArithmeticOverflow)
    );

    assert_eq!(manager.market(&id).unwrap(), &before);
    assert_eq!(usdc(&manager, ALICE), STARTING_USDC);
    assert_eq!(tokens(&manager, &id, Outcome::Yes, ALICE), 0);
    assert_eq!(manager.ledger().inner.supply_of(before.yes_mint()), 0);
    assert!(!manager.ledger().inner.has_account(before.yes_mint(), ALICE));
    manager.check_custody(&id).unwrap();

    manager.ledger_mut().refuse_mint_to = None;
    assert_eq!(manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap(), 1_000_000_000);
    manager.check_custody(&id).unwrap();
}

#[test]
fn test_failed_sell_leaves_no_empty_currency_account() {
    let ledger = FlakyLedger { inner: Ledger::new(), refuse_mint_to: None };
    let (mut manager, _) = funded_manager(ledger);
    let id = manager.create_market(AUTHORITY, "Proj", GOAL, NOW + DAY).unwrap();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    // dave holds tokens but has never held currency
    let yes_mint = manager.market(&id).unwrap().yes_mint().to_string();
    manager.ledger_mut().open_account(&yes_mint, "dave");
    manager.ledger_mut().transfer(&yes_mint, ALICE, "dave", 100_000_000).unwrap();
    let supply = manager.ledger().inner.supply_of(&yes_mint);

    // Pool currency is gone, so paying the seller out must fail
    let custody = custody_owner(&id);
    manager.ledger_mut().inner.burn_from("USDC", &custody, 1_000_000).unwrap();
    assert!(manager.sell(&id, "dave", Outcome::Yes, 100_000_000).is_err());

    assert!(!manager.ledger().inner.has_account("USDC", "dave"));
    assert_eq!(manager.ledger().inner.supply_of(&yes_mint), supply);
    assert_eq!(tokens(&manager, &id, Outcome::Yes, "dave"), 100_000_000);
}

#[test]
fn test_slippage_rejection_leaves_no_trace() {
    let (mut manager, _, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();
    let before = manager.market(&id).unwrap().clone();

    let err = manager
        .execute(&id, BOB, &TradeIntent::buy(Outcome::Yes, 1_000_000), Some(600_000_000))
        .unwrap_err();
    assert_eq!(err, MarketError::SlippageExceeded { min_out: 600_000_000, actual: 500_000_000 });
    assert_eq!(manager.market(&id).unwrap(), &before);
    assert_eq!(usdc(&manager, BOB), STARTING_USDC);
}

// ============================================================================
// CUSTODY ISOLATION
// ============================================================================

#[test]
fn test_trader_named_after_market_cannot_touch_custody() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_000_000).unwrap();

    // Unfunded, the market id is just a trader without currency
    assert_eq!(
        manager.buy(&id, &id, Outcome::Yes, 1_000_000),
        Err(MarketError::AccountNotFound(format!("USDC:{}", id)))
    );
    assert_eq!(
        manager.sell(&id, &id, Outcome::Yes, 1),
        Err(MarketError::InsufficientBalance { available: 0, requested: 1 })
    );
    manager.check_custody(&id).unwrap();

    // Funded, it trades with its own balances
    manager.ledger_mut().open_account("USDC", &id);
    manager.ledger_mut().mint_to("USDC", &id, 1_000_000).unwrap();
    assert_eq!(manager.buy(&id, &id, Outcome::Yes, 1_000_000).unwrap(), 500_000_000);
    manager.check_custody(&id).unwrap();
    assert_eq!(usdc(&manager, &id), 0);
    manager.sell(&id, &id, Outcome::Yes, 500_000_000).unwrap();
    manager.check_custody(&id).unwrap();

    // The custody owner itself is never a valid trader or holder
    let custody = custody_owner(&id);
    let reserved = MarketError::ReservedAccount(custody.clone());
    assert_eq!(manager.buy(&id, &custody, Outcome::Yes, 1_000_000), Err(reserved.clone()));
    assert_eq!(manager.sell(&id, &custody, Outcome::Yes, 1), Err(reserved.clone()));
    manager.check_custody(&id).unwrap();

    clock.advance(DAY);
    manager.settle(&id, AUTHORITY, GOAL).unwrap();
    assert_eq!(manager.redeem(&id, &custody, 1), Err(reserved));
    assert_eq!(
        manager.redeem(&id, &id, 1),
        Err(MarketError::InsufficientBalance { available: 0, requested: 1 })
    );
    manager.check_custody(&id).unwrap();

    // ALICE still owns the whole winning side and can claim the full pot
    let pot = manager.market(&id).unwrap().currency_reserve();
    let held = tokens(&manager, &id, Outcome::Yes, ALICE);
    assert_eq!(manager.redeem(&id, ALICE, held).unwrap(), pot);
    assert_eq!(manager.market(&id).unwrap().yes_reserve(), 0);
    manager.check_custody(&id).unwrap();
}

// ============================================================================
// MARKET ACCOUNTS
// ============================================================================

#[test]
fn test_markets_are_unique_per_authority_and_name() {
    let (mut manager, _, id) = setup();
    assert_eq!(id, Market::address(AUTHORITY, "Proj"));
    assert_eq!(
        manager.create_market(AUTHORITY, "Proj", 1, NOW + 10),
        Err(MarketError::MarketAlreadyExists(id.clone()))
    );

    let other = manager.create_market(AUTHORITY, "Proj 2", 1, NOW + 10).unwrap();
    assert_ne!(other, id);
    assert_eq!(manager.markets().len(), 2);
}

#[test]
fn test_market_account_survives_encoding() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::Yes, 1_500_000).unwrap();
    clock.advance(DAY);
    manager.settle(&id, AUTHORITY, GOAL - 1).unwrap();

    let market = manager.market(&id).unwrap();
    let bytes = market.to_account_bytes().unwrap();
    assert_eq!(&Market::from_account_bytes(&bytes).unwrap(), market);

    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(Market::from_account_bytes(truncated), Err(MarketError::CorruptAccount(_))));
}

#[test]
fn test_position_reports_redeemable_value() {
    let (mut manager, clock, id) = setup();
    manager.buy(&id, ALICE, Outcome::No, 2_000_000).unwrap();
    manager.buy(&id, BOB, Outcome::Yes, 1_000_000).unwrap();

    let open = manager.position(&id, ALICE).unwrap();
    assert_eq!(open.no, 2_000_000_000);
    assert_eq!(open.redeemable_value, None);

    clock.advance(DAY);
    manager.settle(&id, AUTHORITY, 0).unwrap();

    assert_eq!(manager.position(&id, ALICE).unwrap().redeemable_value, Some(3_000_000));
    assert_eq!(manager.position(&id, BOB).unwrap().redeemable_value, Some(0));
}
