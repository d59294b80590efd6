//! Ledger Store
//!
//! Holds wallet balances per (account, currency) and the ledger transactions
//! that moved them.
//!
//! # Invariants
//!
//! - No balance ever goes negative: adjustments that would overdraw are rejected
//! - Multi-leg postings apply all legs or none
//! - Every balance equals the sum of its journal entries
//! - Ledger transactions are cancelled, never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use ledger::InMemoryLedger;
pub use store::LedgerStore;
pub use types::{
    AccountId, BalanceKey, Currency, LedgerTransaction, LedgerTransactionId,
    LedgerTransactionStatus, TransactionDraft,
};
