//! Error types for the ledger

use crate::types::{AccountId, Currency};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Adjustment would leave a balance below zero
    #[error("Insufficient funds on {account} ({currency}): available {available}, required {required}")]
    InsufficientFunds {
        /// Account that would be overdrawn
        account: AccountId,
        /// Balance currency
        currency: Currency,
        /// Balance before the adjustment
        available: Decimal,
        /// Amount the adjustment needed
        required: Decimal,
    },

    /// Ledger transaction not found
    #[error("Ledger transaction not found: {0}")]
    TransactionNotFound(String),

    /// Ledger transaction is not in a state that allows the operation
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// Currency code is not supported
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Invalid amount or draft
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Invariant violation (money conservation, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Backing store unreachable or timed out
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}
