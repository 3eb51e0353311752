//! Wallet service boundary
//!
//! The core never stores balances itself: it debits a stake at join time
//! and credits payouts at exit time through this trait. The in-memory
//! implementation backs tests and standalone runs; a production deployment
//! plugs a real ledger service in behind the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::settlement::Value;

/// Authenticated account identifier, supplied by the identity service
pub type AccountId = Uuid;

/// Errors from wallet operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("wallet service unavailable: {0}")]
    Unavailable(String),
}

/// External account/wallet service
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Current available balance
    async fn balance(&self, account: AccountId) -> Result<Decimal, WalletError>;

    /// Atomically remove `amount` from the account. Fails with
    /// `InsufficientFunds` without mutating anything when the balance is
    /// too low.
    async fn debit(&self, account: AccountId, amount: Value) -> Result<(), WalletError>;

    /// Add `amount` to the account. Also used as the compensating action
    /// when a join fails after its stake was debited.
    async fn credit(&self, account: AccountId, amount: Value) -> Result<(), WalletError>;
}

/// In-memory wallet. Unknown accounts start at a configurable opening
/// balance so a standalone server is playable without a funding flow.
pub struct InMemoryWallet {
    accounts: DashMap<AccountId, Decimal>,
    opening_balance: Decimal,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::with_opening_balance(Decimal::ZERO)
    }

    pub fn with_opening_balance(opening_balance: Decimal) -> Self {
        Self {
            accounts: DashMap::new(),
            opening_balance,
        }
    }

    /// Set an account's balance directly (test setup)
    pub fn set_balance(&self, account: AccountId, balance: Decimal) {
        self.accounts.insert(account, balance);
    }
}

impl Default for InMemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletService for InMemoryWallet {
    async fn balance(&self, account: AccountId) -> Result<Decimal, WalletError> {
        Ok(*self
            .accounts
            .entry(account)
            .or_insert(self.opening_balance))
    }

    async fn debit(&self, account: AccountId, amount: Value) -> Result<(), WalletError> {
        let mut balance = self
            .accounts
            .entry(account)
            .or_insert(self.opening_balance);
        if *balance < amount.get() {
            warn!(
                "debit refused for {}: balance {} < {}",
                account, *balance, amount
            );
            return Err(WalletError::InsufficientFunds {
                balance: *balance,
                requested: amount.get(),
            });
        }
        *balance -= amount.get();
        debug!("debited {} from {}, balance {}", amount, account, *balance);
        Ok(())
    }

    async fn credit(&self, account: AccountId, amount: Value) -> Result<(), WalletError> {
        let mut balance = self
            .accounts
            .entry(account)
            .or_insert(self.opening_balance);
        *balance += amount.get();
        debug!("credited {} to {}, balance {}", amount, account, *balance);
        Ok(())
    }
}
