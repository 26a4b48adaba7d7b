//! Error types for the ledger engine.

use coin_ledger_core::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The amount is not strictly positive.
    #[error("amount must be > 0 (got {0})")]
    InvalidAmount(i64),

    /// The target balance would violate the non-negative invariant.
    #[error("balance may not be negative (got {0})")]
    NegativeBalance(i64),

    /// The actor id is not a well-formed UUID.
    #[error(transparent)]
    InvalidActor(#[from] IdError),

    /// Debit larger than the current balance.
    #[error("insufficient balance (have {balance}, need {required})")]
    InsufficientBalance {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// A mutating operation targeted an account that does not exist.
    #[error("account not found: {id}")]
    AccountNotFound {
        /// The account id that was not found.
        id: String,
    },

    /// Storage failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
