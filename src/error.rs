// Error types for the market engine

use serde::Serialize;
use std::fmt;

use crate::ledger::LedgerError;

/// Every way a market operation can fail.
///
/// All variants are terminal for the operation that raised them: the
/// market and the ledger are left exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarketError {
    InvalidDeadline,
    InvalidProjectName,
    ZeroAmount,
    /// Pricing produced zero output for a non-zero input
    ZeroOutput,
    NoLiquidity,
    InsufficientBalance { available: u64, requested: u64 },
    ArithmeticOverflow,
    MarketSettled,
    DeadlinePassed,
    DeadlineNotPassed,
    AlreadySettled,
    Unauthorized,
    MarketNotSettled,
    MarketNotFound(String),
    MarketAlreadyExists(String),
    AccountNotFound(String),
    SlippageExceeded { min_out: u64, actual: u64 },
    InvalidOutcome(String),
    CorruptAccount(String),
    /// Owner name reserved for market custody
    ReservedAccount(String),
}

impl MarketError {
    /// Stable machine-readable kind, used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::InvalidDeadline => "InvalidDeadline",
            MarketError::InvalidProjectName => "InvalidProjectName",
            MarketError::ZeroAmount => "ZeroAmount",
            MarketError::ZeroOutput => "ZeroOutput",
            MarketError::NoLiquidity => "NoLiquidity",
            MarketError::InsufficientBalance { .. } => "InsufficientBalance",
            MarketError::ArithmeticOverflow => "ArithmeticOverflow",
            MarketError::MarketSettled => "MarketSettled",
            MarketError::DeadlinePassed => "DeadlinePassed",
            MarketError::DeadlineNotPassed => "DeadlineNotPassed",
            MarketError::AlreadySettled => "AlreadySettled",
            MarketError::Unauthorized => "Unauthorized",
            MarketError::MarketNotSettled => "MarketNotSettled",
            MarketError::MarketNotFound(_) => "MarketNotFound",
            MarketError::MarketAlreadyExists(_) => "MarketAlreadyExists",
            MarketError::AccountNotFound(_) => "AccountNotFound",
            MarketError::SlippageExceeded { .. } => "SlippageExceeded",
            MarketError::InvalidOutcome(_) => "InvalidOutcome",
            MarketError::CorruptAccount(_) => "CorruptAccount",
            MarketError::ReservedAccount(_) => "ReservedAccount",
        }
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::InvalidDeadline => write!(f, "Invalid deadline - must be in the future"),
            MarketError::InvalidProjectName => write!(f, "Project name must be 1 to 64 bytes"),
            MarketError::ZeroAmount => write!(f, "Amount must be greater than zero"),
            MarketError::ZeroOutput => write!(f, "Trade is too small to produce any output"),
            MarketError::NoLiquidity => write!(f, "Pool has no liquidity on this side"),
            MarketError::InsufficientBalance { available, requested } => {
                write!(f, "Insufficient balance: {} < {}", available, requested)
            }
            MarketError::ArithmeticOverflow => write!(f, "Math overflow occurred"),
            MarketError::MarketSettled => write!(f, "Market has already been settled"),
            MarketError::DeadlinePassed => write!(f, "Market deadline has passed"),
            MarketError::DeadlineNotPassed => write!(f, "Market deadline has not passed yet"),
            MarketError::AlreadySettled => write!(f, "Market settlement already recorded"),
            MarketError::Unauthorized => {
                write!(f, "Unauthorized - only market authority can perform this action")
            }
            MarketError::MarketNotSettled => write!(f, "Market has not been settled yet"),
            MarketError::MarketNotFound(id) => write!(f, "Market not found: {}", id),
            MarketError::MarketAlreadyExists(id) => write!(f, "Market already exists: {}", id),
            MarketError::AccountNotFound(account) => write!(f, "Account not found: {}", account),
            MarketError::SlippageExceeded { min_out, actual } => write!(
                f,
                "Output {} is below minimum {}. Reduce amount or increase slippage tolerance.",
                actual, min_out
            ),
            MarketError::InvalidOutcome(raw) => write!(f, "Invalid outcome: {}", raw),
            MarketError::CorruptAccount(reason) => write!(f, "Corrupt market account: {}", reason),
            MarketError::ReservedAccount(owner) => {
                write!(f, "Account {} is reserved for market custody", owner)
            }
        }
    }
}

impl std::error::Error for MarketError {}

impl From<LedgerError> for MarketError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { available, requested, .. } => {
                MarketError::InsufficientBalance { available, requested }
            }
            LedgerError::AccountNotFound(account) => MarketError::AccountNotFound(account),
            LedgerError::Overflow => MarketError::ArithmeticOverflow,
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_convert() {
        let err: MarketError = LedgerError::InsufficientBalance {
            account: "USDC:alice".into(),
            available: 5,
            requested: 10,
        }
        .into();
        assert_eq!(err, MarketError::InsufficientBalance { available: 5, requested: 10 });
        assert_eq!(err.code(), "InsufficientBalance");

        let err: MarketError = LedgerError::Overflow.into();
        assert_eq!(err, MarketError::ArithmeticOverflow);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            MarketError::InsufficientBalance { available: 1, requested: 2 }.to_string(),
            "Insufficient balance: 1 < 2"
        );
        assert_eq!(MarketError::MarketNotFound("abc".into()).to_string(), "Market not found: abc");
    }
}
