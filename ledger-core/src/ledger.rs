//! In-memory Ledger Store
//!
//! Each balance lives in its own `Mutex` cell. A posting that touches
//! several balances locks every cell it needs in `BalanceKey` order before
//! checking or writing anything, so two postings racing on the same
//! accounts can neither deadlock nor interleave.
//!
//! # Example
//!
//! ```
//! use ledger_core::{AccountId, Currency, InMemoryLedger, LedgerStore};
//! use rust_decimal::Decimal;
//!
//! # tokio_test_rt(async {
//! let ledger = InMemoryLedger::new();
//! let wallet = AccountId::new("wallet-1");
//! ledger.adjust_balance(&wallet, Currency::EUR, Decimal::from(100)).await.unwrap();
//! assert_eq!(ledger.get_balance(&wallet, Currency::EUR).await.unwrap(), Decimal::from(100));
//! # });
//! # fn tokio_test_rt<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use crate::{
    store::LedgerStore,
    types::{
        AccountId, BalanceKey, Currency, LedgerTransaction, LedgerTransactionId,
        LedgerTransactionStatus, TransactionDraft,
    },
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One signed balance change, kept forever
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Balance changed
    pub key: BalanceKey,
    /// Signed delta
    pub delta: Decimal,
    /// Transaction that caused it (None for direct adjustments)
    pub transaction_id: Option<LedgerTransactionId>,
    /// When it was applied
    pub applied_at: DateTime<Utc>,
}

/// In-memory ledger with per-balance locking
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: DashMap<BalanceKey, Arc<Mutex<Decimal>>>,
    transactions: DashMap<LedgerTransactionId, LedgerTransaction>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl InMemoryLedger {
    /// Create empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &BalanceKey) -> Arc<Mutex<Decimal>> {
        self.balances
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Decimal::ZERO)))
            .clone()
    }

    /// Apply signed legs atomically
    ///
    /// Legs on the same balance are merged first; cells are then locked in
    /// key order. Nothing is written unless every resulting balance is
    /// non-negative.
    fn apply_legs(
        &self,
        legs: Vec<(BalanceKey, Decimal)>,
        transaction_id: Option<LedgerTransactionId>,
    ) -> Result<()> {
        let mut merged: BTreeMap<BalanceKey, Decimal> = BTreeMap::new();
        for (key, delta) in legs {
            let slot = merged.entry(key).or_insert(Decimal::ZERO);
            *slot = slot
                .checked_add(delta)
                .ok_or_else(|| overflow(&format!("merging legs on one balance, delta {}", delta)))?;
        }

        let cells: Vec<(BalanceKey, Decimal, Arc<Mutex<Decimal>>)> = merged
            .into_iter()
            .map(|(key, delta)| {
                let cell = self.cell(&key);
                (key, delta, cell)
            })
            .collect();

        let mut guards: Vec<_> = cells.iter().map(|(_, _, cell)| cell.lock()).collect();

        let mut updated = Vec::with_capacity(cells.len());
        for ((key, delta, _), guard) in cells.iter().zip(guards.iter()) {
            let balance = guard
                .checked_add(*delta)
                .ok_or_else(|| overflow(&format!("balance {} plus {}", key, delta)))?;
            if balance < Decimal::ZERO {
                return Err(Error::InsufficientFunds {
                    account: key.account.clone(),
                    currency: key.currency,
                    available: **guard,
                    required: -*delta,
                });
            }
            updated.push(balance);
        }

        let now = Utc::now();
        let mut journal = self.journal.lock();
        for (((key, delta, _), guard), balance) in
            cells.iter().zip(guards.iter_mut()).zip(updated)
        {
            **guard = balance;
            journal.push(JournalEntry {
                key: key.clone(),
                delta: *delta,
                transaction_id,
                applied_at: now,
            });
        }

        Ok(())
    }

    fn validate_draft(draft: &TransactionDraft) -> Result<()> {
        if draft.amount <= Decimal::ZERO || draft.converted_amount <= Decimal::ZERO {
            return Err(Error::InvalidTransaction(
                "Amounts must be positive".to_string(),
            ));
        }
        if draft.fee < Decimal::ZERO {
            return Err(Error::InvalidTransaction(
                "Fee must not be negative".to_string(),
            ));
        }
        if draft.from_account.as_ref() == Some(&draft.to_account)
            && draft.currency == draft.converted_currency
        {
            return Err(Error::InvalidTransaction(
                "Debit and credit balance are the same".to_string(),
            ));
        }
        Ok(())
    }

    /// Full journal, oldest first
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    /// Snapshot of all balances
    pub fn balances(&self) -> HashMap<BalanceKey, Decimal> {
        self.balances
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value().lock()))
            .collect()
    }

    /// Check money conservation
    ///
    /// Every balance must equal the sum of its journal entries, and every
    /// balance must be non-negative.
    pub fn verify_conservation(&self) -> Result<()> {
        let mut expected: HashMap<BalanceKey, Decimal> = HashMap::new();
        for entry in self.journal.lock().iter() {
            *expected.entry(entry.key.clone()).or_insert(Decimal::ZERO) += entry.delta;
        }

        for (key, balance) in self.balances() {
            let journaled = expected.get(&key).copied().unwrap_or(Decimal::ZERO);
            if balance != journaled {
                return Err(Error::InvariantViolation(format!(
                    "Balance {} is {} but journal sums to {}",
                    key, balance, journaled
                )));
            }
            if balance < Decimal::ZERO {
                return Err(Error::InvariantViolation(format!(
                    "Balance {} is negative: {}",
                    key, balance
                )));
            }
        }

        Ok(())
    }
}

fn overflow(what: &str) -> Error {
    Error::InvalidTransaction(format!("Amount out of range: {}", what))
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get_balance(&self, account: &AccountId, currency: Currency) -> Result<Decimal> {
        let key = BalanceKey::new(account.clone(), currency);
        Ok(self
            .balances
            .get(&key)
            .map(|cell| *cell.lock())
            .unwrap_or(Decimal::ZERO))
    }

    async fn adjust_balance(
        &self,
        account: &AccountId,
        currency: Currency,
        delta: Decimal,
    ) -> Result<Decimal> {
        let key = BalanceKey::new(account.clone(), currency);
        self.apply_legs(vec![(key.clone(), delta)], None)?;
        debug!(balance = %key, %delta, "Balance adjusted");
        self.get_balance(account, currency).await
    }

    async fn post_transaction(&self, draft: TransactionDraft) -> Result<LedgerTransaction> {
        Self::validate_draft(&draft)?;

        let now = Utc::now();
        let transaction = LedgerTransaction {
            id: LedgerTransactionId::new(),
            from_account: draft.from_account,
            to_account: draft.to_account,
            currency: draft.currency,
            converted_currency: draft.converted_currency,
            amount: draft.amount,
            converted_amount: draft.converted_amount,
            fee: draft.fee,
            status: LedgerTransactionStatus::Completed,
            reference: draft.reference,
            created_at: now,
            completed_at: Some(now),
            cancelled_at: None,
        };

        self.apply_legs(transaction.legs(), Some(transaction.id))?;
        self.transactions.insert(transaction.id, transaction.clone());

        debug!(
            transaction_id = %transaction.id,
            reference = %transaction.reference,
            "Ledger transaction posted"
        );

        Ok(transaction)
    }

    async fn cancel_transaction(&self, id: LedgerTransactionId) -> Result<LedgerTransaction> {
        // Holding the entry serializes concurrent cancels of the same transaction
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;

        if entry.status != LedgerTransactionStatus::Completed {
            return Err(Error::InvalidState(format!(
                "Transaction {} is {:?}, only completed transactions can be cancelled",
                id, entry.status
            )));
        }

        self.apply_legs(entry.reversal_legs(), Some(id))?;
        entry.status = LedgerTransactionStatus::Cancelled;
        entry.cancelled_at = Some(Utc::now());

        debug!(transaction_id = %id, "Ledger transaction cancelled");

        Ok(entry.clone())
    }

    async fn get_transaction(&self, id: LedgerTransactionId) -> Result<LedgerTransaction> {
        self.transactions
            .get(&id)
            .map(|tx| tx.clone())
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))
    }
}
