// Application state management

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{MarketError, MarketResult};
use crate::ledger::{Ledger, TokenLedger};
use crate::market_resolve::{is_custody_owner, MarketManager, SettlementPolicy};

pub type SharedState = Arc<Mutex<AppState>>;

/// Lines kept in the activity feed
pub const MAX_ACTIVITY: usize = 1000;

pub struct AppState {
    pub manager: MarketManager<Ledger>,
    pub activity: VecDeque<String>,
    pub config: Config,
}

impl AppState {
    /// Build the engine and fund the configured genesis accounts
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> MarketResult<Self> {
        let manager = MarketManager::new(
            Ledger::new(),
            clock,
            SettlementPolicy::new(config.settlement_comparator),
            config.currency_mint.clone(),
        );

        let mut state = Self {
            manager,
            activity: VecDeque::new(),
            config,
        };

        let genesis = state.config.genesis_accounts.clone();
        for (owner, amount) in &genesis {
            state.fund(owner, *amount)?;
        }

        info!(
            currency = %state.config.currency_mint,
            comparator = ?state.config.settlement_comparator,
            genesis_accounts = genesis.len(),
            "market engine initialized"
        );
        Ok(state)
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Credit currency to an owner, opening the account if needed
    pub fn fund(&mut self, owner: &str, amount: u64) -> MarketResult<()> {
        if is_custody_owner(owner) {
            return Err(MarketError::ReservedAccount(owner.to_string()));
        }
        let mint = self.manager.currency_mint().to_string();
        let ledger = self.manager.ledger_mut();
        ledger.open_account(&mint, owner);
        ledger.mint_to(&mint, owner, amount)?;
        self.log_activity("💰", "FUND", &format!("{} | {} {}", owner, amount, mint));
        Ok(())
    }

    pub fn log_activity(&mut self, emoji: &str, action: &str, details: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let entry = format!("[{}] {} {} | {}", timestamp, emoji, action, details);
        info!(target: "activity", "{}", entry);
        self.activity.push_back(entry);
        while self.activity.len() > MAX_ACTIVITY {
            self.activity.pop_front();
        }
    }

    /// Most recent entries first
    pub fn recent_activity(&self, limit: usize) -> Vec<String> {
        self.activity.iter().rev().take(limit).cloned().collect()
    }
}
