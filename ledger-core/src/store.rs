//! Ledger Store port
//!
//! Balances are only ever changed through this trait. Implementations must
//! apply the legs of a posting atomically: a reader never observes the debit
//! without the matching credit.

use crate::{
    types::{AccountId, Currency, LedgerTransaction, LedgerTransactionId, TransactionDraft},
    Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Balance store with atomic adjustments
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance; unknown balances read as zero
    async fn get_balance(&self, account: &AccountId, currency: Currency) -> Result<Decimal>;

    /// Apply a signed delta to one balance
    ///
    /// Fails with `InsufficientFunds` if the result would be negative.
    /// Returns the new balance.
    async fn adjust_balance(
        &self,
        account: &AccountId,
        currency: Currency,
        delta: Decimal,
    ) -> Result<Decimal>;

    /// Post a transaction: debit and credit legs applied as one unit
    async fn post_transaction(&self, draft: TransactionDraft) -> Result<LedgerTransaction>;

    /// Reverse a completed transaction and mark it cancelled
    async fn cancel_transaction(&self, id: LedgerTransactionId) -> Result<LedgerTransaction>;

    /// Fetch a transaction by id
    async fn get_transaction(&self, id: LedgerTransactionId) -> Result<LedgerTransaction>;
}
