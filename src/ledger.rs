/// Token Ledger Module
///
/// Fungible token accounts keyed by (mint, owner):
/// - The `TokenLedger` trait is the seam the market engine moves balances through
/// - `Ledger` is the in-memory implementation used by the service and tests
/// - `Journal` records applied movements so a failed operation can be unwound
///
/// Every call is atomic on its own: it either moves the full amount or
/// returns an error without touching any balance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InsufficientBalance { account: String, available: u64, requested: u64 },
    AccountNotFound(String),
    Overflow,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InsufficientBalance { account, available, requested } => {
                write!(f, "Insufficient balance in {}: {} < {}", account, available, requested)
            }
            LedgerError::AccountNotFound(account) => write!(f, "Account not found: {}", account),
            LedgerError::Overflow => write!(f, "Token amount overflow"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ============================================================================
// LEDGER TRAIT
// ============================================================================

/// Token-ledger collaborator consumed by the market engine
pub trait TokenLedger {
    /// Create the (mint, owner) account if it does not exist yet.
    /// Returns true when the account was created by this call.
    fn open_account(&mut self, mint: &str, owner: &str) -> bool;

    /// Remove an empty account
    fn close_account(&mut self, mint: &str, owner: &str) -> Result<(), LedgerError>;

    fn mint_to(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError>;

    fn burn_from(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError>;

    fn transfer(&mut self, mint: &str, from: &str, to: &str, amount: u64) -> Result<(), LedgerError>;

    fn balance_of(&self, mint: &str, owner: &str) -> Result<u64, LedgerError>;
}

/// Display key for a token account
pub fn account_key(mint: &str, owner: &str) -> String {
    format!("{}:{}", mint, owner)
}

// ============================================================================
// TRANSACTION RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TxType {
    AccountOpened,
    AccountClosed,
    MintTo,
    Burn,
    Transfer,
}

/// A single ledger movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tx_type: TxType,
    pub mint: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: u64,
    pub timestamp: i64,
}

impl Transaction {
    fn new(tx_type: TxType, mint: &str, from: Option<&str>, to: Option<&str>, amount: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx_type,
            mint: mint.to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            amount,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Summary counters for the service health view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub accounts: usize,
    pub mints: usize,
    pub transactions: usize,
}

// ============================================================================
// IN-MEMORY LEDGER
// ============================================================================

#[derive(Debug, Default)]
pub struct Ledger {
    /// (mint, owner) -> balance
    balances: HashMap<(String, String), u64>,
    /// mint -> outstanding supply
    supply: HashMap<String, u64>,
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total outstanding supply of a mint
    pub fn supply_of(&self, mint: &str) -> u64 {
        self.supply.get(mint).copied().unwrap_or(0)
    }

    pub fn has_account(&self, mint: &str, owner: &str) -> bool {
        self.balances.contains_key(&(mint.to_string(), owner.to_string()))
    }

    /// Every account the owner holds, as (mint, balance)
    pub fn accounts_of(&self, owner: &str) -> Vec<(String, u64)> {
        let mut accounts: Vec<(String, u64)> = self
            .balances
            .iter()
            .filter(|((_, o), _)| o == owner)
            .map(|((mint, _), balance)| (mint.clone(), *balance))
            .collect();
        accounts.sort();
        accounts
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            accounts: self.balances.len(),
            mints: self.supply.len(),
            transactions: self.transactions.len(),
        }
    }

    fn balance_mut(&mut self, mint: &str, owner: &str) -> Result<&mut u64, LedgerError> {
        self.balances
            .get_mut(&(mint.to_string(), owner.to_string()))
            .ok_or_else(|| LedgerError::AccountNotFound(account_key(mint, owner)))
    }
}

impl TokenLedger for Ledger {
    fn open_account(&mut self, mint: &str, owner: &str) -> bool {
        if self.has_account(mint, owner) {
            return false;
        }
        self.balances.insert((mint.to_string(), owner.to_string()), 0);
        self.transactions
            .push(Transaction::new(TxType::AccountOpened, mint, None, Some(owner), 0));
        true
    }

    fn close_account(&mut self, mint: &str, owner: &str) -> Result<(), LedgerError> {
        let balance = self.balance_of(mint, owner)?;
        if balance > 0 {
            return Err(LedgerError::InsufficientBalance {
                account: account_key(mint, owner),
                available: 0,
                requested: balance,
            });
        }
        self.balances.remove(&(mint.to_string(), owner.to_string()));
        self.transactions
            .push(Transaction::new(TxType::AccountClosed, mint, Some(owner), None, 0));
        Ok(())
    }

    fn mint_to(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        let supply = self.supply_of(mint).checked_add(amount).ok_or(LedgerError::Overflow)?;
        let balance = self.balance_mut(mint, owner)?;
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.supply.insert(mint.to_string(), supply);
        self.transactions
            .push(Transaction::new(TxType::MintTo, mint, None, Some(owner), amount));
        Ok(())
    }

    fn burn_from(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        let supply = self.supply_of(mint);
        let balance = self.balance_mut(mint, owner)?;
        if *balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account_key(mint, owner),
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        // supply >= every balance of the mint
        self.supply.insert(mint.to_string(), supply - amount);
        self.transactions
            .push(Transaction::new(TxType::Burn, mint, Some(owner), None, amount));
        Ok(())
    }

    fn transfer(&mut self, mint: &str, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(mint, from)?;
        let to_balance = self.balance_of(mint, to)?;
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account_key(mint, from),
                available: from_balance,
                requested: amount,
            });
        }
        if from != to {
            let credited = to_balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
            *self.balance_mut(mint, from)? = from_balance - amount;
            *self.balance_mut(mint, to)? = credited;
        }
        self.transactions
            .push(Transaction::new(TxType::Transfer, mint, Some(from), Some(to), amount));
        Ok(())
    }

    fn balance_of(&self, mint: &str, owner: &str) -> Result<u64, LedgerError> {
        self.balances
            .get(&(mint.to_string(), owner.to_string()))
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(account_key(mint, owner)))
    }
}

// ============================================================================
// ROLLBACK JOURNAL
// ============================================================================

#[derive(Debug, Clone)]
enum Movement {
    Opened { mint: String, owner: String },
    Minted { mint: String, owner: String, amount: u64 },
    Burned { mint: String, owner: String, amount: u64 },
    Transferred { mint: String, from: String, to: String, amount: u64 },
}

/// Applies ledger movements and remembers them until `commit`.
///
/// Dropping an uncommitted journal reverses every recorded movement in
/// reverse order, so an operation that fails half-way leaves no trace.
pub struct Journal<'a, L: TokenLedger> {
    ledger: &'a mut L,
    applied: Vec<Movement>,
    committed: bool,
}

impl<'a, L: TokenLedger> Journal<'a, L> {
    pub fn new(ledger: &'a mut L) -> Self {
        Self { ledger, applied: Vec::new(), committed: false }
    }

    /// Open an account for the rest of the operation. An account that
    /// already existed is left alone on rollback.
    pub fn open_account(&mut self, mint: &str, owner: &str) {
        if self.ledger.open_account(mint, owner) {
            self.applied.push(Movement::Opened {
                mint: mint.to_string(),
                owner: owner.to_string(),
            });
        }
    }

    pub fn mint_to(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        self.ledger.mint_to(mint, owner, amount)?;
        self.applied.push(Movement::Minted {
            mint: mint.to_string(),
            owner: owner.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn burn_from(&mut self, mint: &str, owner: &str, amount: u64) -> Result<(), LedgerError> {
        self.ledger.burn_from(mint, owner, amount)?;
        self.applied.push(Movement::Burned {
            mint: mint.to_string(),
            owner: owner.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn transfer(&mut self, mint: &str, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        self.ledger.transfer(mint, from, to, amount)?;
        self.applied.push(Movement::Transferred {
            mint: mint.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn commit(mut self) {
        self.committed = true;
    }

    fn rollback(&mut self) {
        while let Some(movement) = self.applied.pop() {
            let undone = match &movement {
                Movement::Opened { mint, owner } => self.ledger.close_account(mint, owner),
                Movement::Minted { mint, owner, amount } => self.ledger.burn_from(mint, owner, *amount),
                Movement::Burned { mint, owner, amount } => self.ledger.mint_to(mint, owner, *amount),
                Movement::Transferred { mint, from, to, amount } => {
                    self.ledger.transfer(mint, to, from, *amount)
                }
            };
            if let Err(e) = undone {
                tracing::error!(?movement, error = %e, "ledger rollback step failed");
            }
        }
    }
}

impl<'a, L: TokenLedger> Drop for Journal<'a, L> {
    fn drop(&mut self) {
        if !self.committed && !self.applied.is_empty() {
            tracing::warn!(movements = self.applied.len(), "rolling back uncommitted ledger movements");
            self.rollback();
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_and_balance() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");
        ledger.mint_to("USDC", "alice", 500).unwrap();

        assert_eq!(ledger.balance_of("USDC", "alice").unwrap(), 500);
        assert_eq!(ledger.supply_of("USDC"), 500);
    }

    #[test]
    fn test_missing_account() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.balance_of("USDC", "ghost"),
            Err(LedgerError::AccountNotFound("USDC:ghost".into()))
        );
        assert!(ledger.mint_to("USDC", "ghost", 1).is_err());
        assert_eq!(ledger.supply_of("USDC"), 0);
    }

    #[test]
    fn test_open_account_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");
        ledger.mint_to("USDC", "alice", 7).unwrap();
        ledger.open_account("USDC", "alice");

        assert_eq!(ledger.balance_of("USDC", "alice").unwrap(), 7);
    }

    #[test]
    fn test_journal_closes_accounts_it_opened() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");

        {
            let mut journal = Journal::new(&mut ledger);
            journal.open_account("USDC", "alice");
            journal.open_account("YES", "alice");
            journal.mint_to("YES", "alice", 3).unwrap();
            assert!(journal.mint_to("NO", "alice", 1).is_err());
        }

        assert!(ledger.has_account("USDC", "alice"));
        assert!(!ledger.has_account("YES", "alice"));
        assert_eq!(ledger.accounts_of("alice"), vec![("USDC".to_string(), 0)]);
    }

    #[test]
    fn test_close_account_requires_empty_balance() {
        let mut ledger = Ledger::new();
        assert!(ledger.open_account("USDC", "alice"));
        assert!(!ledger.open_account("USDC", "alice"));
        ledger.mint_to("USDC", "alice", 1).unwrap();

        assert!(ledger.close_account("USDC", "alice").is_err());
        ledger.burn_from("USDC", "alice", 1).unwrap();
        ledger.close_account("USDC", "alice").unwrap();
        assert!(!ledger.has_account("USDC", "alice"));
    }

    #[test]
    fn test_burn_insufficient() {
        let mut ledger = Ledger::new();
        ledger.open_account("YES", "bob");
        ledger.mint_to("YES", "bob", 10).unwrap();

        let err = ledger.burn_from("YES", "bob", 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 10, requested: 11, .. }));
        assert_eq!(ledger.balance_of("YES", "bob").unwrap(), 10);
        assert_eq!(ledger.supply_of("YES"), 10);
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");
        ledger.open_account("USDC", "pool");
        ledger.mint_to("USDC", "alice", 100).unwrap();

        ledger.transfer("USDC", "alice", "pool", 40).unwrap();
        assert_eq!(ledger.balance_of("USDC", "alice").unwrap(), 60);
        assert_eq!(ledger.balance_of("USDC", "pool").unwrap(), 40);
        assert_eq!(ledger.supply_of("USDC"), 100);

        assert!(ledger.transfer("USDC", "alice", "pool", 61).is_err());
        assert!(ledger.transfer("USDC", "alice", "nobody", 1).is_err());
        assert_eq!(ledger.balance_of("USDC", "alice").unwrap(), 60);
    }

    #[test]
    fn test_journal_rolls_back_on_drop() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");
        ledger.open_account("USDC", "pool");
        ledger.open_account("YES", "alice");
        ledger.mint_to("USDC", "alice", 100).unwrap();

        {
            let mut journal = Journal::new(&mut ledger);
            journal.transfer("USDC", "alice", "pool", 50).unwrap();
            journal.mint_to("YES", "alice", 5_000).unwrap();
            // fails: no account for NO
            assert!(journal.mint_to("NO", "alice", 1).is_err());
        }

        assert_eq!(ledger.balance_of("USDC", "alice").unwrap(), 100);
        assert_eq!(ledger.balance_of("USDC", "pool").unwrap(), 0);
        assert_eq!(ledger.balance_of("YES", "alice").unwrap(), 0);
        assert_eq!(ledger.supply_of("YES"), 0);
    }

    #[test]
    fn test_journal_commit_keeps_movements() {
        let mut ledger = Ledger::new();
        ledger.open_account("YES", "alice");

        let mut journal = Journal::new(&mut ledger);
        journal.mint_to("YES", "alice", 9).unwrap();
        journal.commit();

        assert_eq!(ledger.balance_of("YES", "alice").unwrap(), 9);
    }

    #[test]
    fn test_movements_are_recorded() {
        let mut ledger = Ledger::new();
        ledger.open_account("USDC", "alice");
        ledger.open_account("USDC", "pool");
        ledger.mint_to("USDC", "alice", 10).unwrap();
        ledger.transfer("USDC", "alice", "pool", 4).unwrap();
        assert!(ledger.burn_from("USDC", "alice", 7).is_err());

        let kinds: Vec<TxType> = ledger.transactions().iter().map(|tx| tx.tx_type.clone()).collect();
        assert_eq!(
            kinds,
            vec![TxType::AccountOpened, TxType::AccountOpened, TxType::MintTo, TxType::Transfer]
        );
        let stats = ledger.stats();
        assert_eq!((stats.accounts, stats.mints, stats.transactions), (2, 1, 4));
        assert_eq!(ledger.accounts_of("alice"), vec![("USDC".to_string(), 6)]);
    }
}
