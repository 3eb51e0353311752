//! Error taxonomy for the game core
//!
//! Validation errors are rejected at the boundary with no state mutation.
//! Races (two worms on one food item, a stale intent for a settled worm)
//! are deliberately not errors: the first resolver wins and the loser's
//! attempt is a no-op.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::wallet::WalletError;

/// Errors surfaced by join and settlement operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("stake must be positive, got {0}")]
    InvalidStake(Decimal),

    #[error("arena is at capacity ({max} players)")]
    ArenaFull { max: usize },

    #[error("arena is not accepting commands")]
    ArenaUnavailable,

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_messages() {
        let err = GameError::InvalidStake(dec!(-5));
        assert_eq!(err.to_string(), "stake must be positive, got -5");

        let err = GameError::ArenaFull { max: 50 };
        assert_eq!(err.to_string(), "arena is at capacity (50 players)");
    }

    #[test]
    fn test_wallet_error_passthrough() {
        let err: GameError = WalletError::InsufficientFunds {
            balance: dec!(1),
            requested: dec!(5),
        }
        .into();
        assert!(err.to_string().contains("insufficient funds"));
    }
}
