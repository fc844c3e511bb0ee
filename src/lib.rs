/// Indie Star Market - binary outcome prediction markets on fundraising goals
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod market_resolve;
pub mod models;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::{MarketError, MarketResult};
pub use ledger::{Journal, Ledger, LedgerError, LedgerStats, TokenLedger, Transaction, TxType};

// Re-export the market engine
pub use market_resolve::{
    CustodySnapshot, Fill, GoalComparator, Market, MarketId, MarketManager, MarketPhase, Outcome,
    PoolReserves, Position, Quote, Redemption, RedemptionReceipt, SettlementPolicy, TradeDirection,
    TradeIntent, TradeReceipt,
};
pub use market_resolve::{
    BOOTSTRAP_TOKENS_PER_CURRENCY_UNIT, CURRENCY_DECIMALS, MAX_PROJECT_NAME_LEN, OUTCOME_TOKEN_DECIMALS,
};

pub use models::{ImpliedOdds, MarketView};
