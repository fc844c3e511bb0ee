// Service configuration, read from the environment (.env supported)

use std::fmt;
use std::net::SocketAddr;

use crate::market_resolve::GoalComparator;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";
pub const DEFAULT_CURRENCY_MINT: &str = "USDC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid {}={:?}: {}", key, value, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Ledger mint used as the market currency
    pub currency_mint: String,
    pub settlement_comparator: GoalComparator,
    pub log_level: tracing::Level,
    /// Currency balances seeded at startup, as (owner, amount)
    pub genesis_accounts: Vec<(String, u64)>,
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| ConfigError::InvalidValue {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let currency_mint = lookup("CURRENCY_MINT")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_MINT.to_string());

        let settlement_comparator = match lookup("SETTLEMENT_COMPARATOR") {
            Some(raw) => raw.parse::<GoalComparator>().map_err(|reason| ConfigError::InvalidValue {
                key: "SETTLEMENT_COMPARATOR",
                value: raw.clone(),
                reason,
            })?,
            None => GoalComparator::default(),
        };

        let log_level = match lookup("LOG_LEVEL") {
            Some(raw) => raw.parse::<tracing::Level>().map_err(|_| ConfigError::InvalidValue {
                key: "LOG_LEVEL",
                value: raw.clone(),
                reason: "expected trace, debug, info, warn or error".into(),
            })?,
            None => tracing::Level::INFO,
        };

        let genesis_accounts = match lookup("GENESIS_ACCOUNTS") {
            Some(raw) => parse_genesis(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            currency_mint,
            settlement_comparator,
            log_level,
            genesis_accounts,
        })
    }
}

/// `owner:amount,owner:amount`
fn parse_genesis(raw: &str) -> Result<Vec<(String, u64)>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "GENESIS_ACCOUNTS",
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (owner, amount) = entry.rsplit_once(':').ok_or_else(|| invalid("expected owner:amount"))?;
            let owner = owner.trim();
            if owner.is_empty() {
                return Err(invalid("empty owner"));
            }
            let amount = amount.trim().parse::<u64>().map_err(|_| invalid("amount must be a u64"))?;
            Ok((owner.to_string(), amount))
        })
        .collect()
}
