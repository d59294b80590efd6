//! Collaborator ports
//!
//! The orchestrator reaches the outside world only through these traits.
//! In-memory implementations live in [`crate::memory`],
//! [`crate::repository`] and [`crate::audit`].

use crate::{AuditEvent, Result, TransferAggregate, TransferId};
use async_trait::async_trait;
use ledger_core::{AccountId, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wallet or bank account as listed in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Ledger account
    pub id: AccountId,
    /// Owning provider
    pub provider: String,
    /// Account currency
    pub currency: Currency,
    /// Inactive accounts are never resolved
    pub active: bool,
}

/// Card that can fund a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Card reference
    pub card_ref: String,
    /// Issuing provider
    pub provider: String,
    /// Account the card draws on
    pub account: AccountId,
    /// Card is usable
    pub active: bool,
}

/// Currency conversion rates
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Rate converting one unit of `source` into `target`
    ///
    /// Fails with `UpstreamUnavailable` when the upstream cannot answer.
    async fn get_rate(&self, source: Currency, target: Currency) -> Result<Decimal>;
}

/// Account and card lookup
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Active account of a provider in a currency, or `NotFound`
    async fn find_active_account(&self, provider: &str, currency: Currency) -> Result<Account>;

    /// Card by reference, or `NotFound`; inactive cards are returned as-is
    async fn find_card(&self, card_ref: &str) -> Result<Card>;
}

/// Write-only audit trail
///
/// Recording is best-effort and must never fail or block the caller.
pub trait AuditSink: Send + Sync {
    /// Record one event
    fn record(&self, event: AuditEvent);
}

/// Transfer aggregate storage
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Store a new aggregate; fails with `Conflict` if the ID exists
    async fn insert(&self, aggregate: TransferAggregate) -> Result<TransferAggregate>;

    /// Load by ID, or `NotFound`
    async fn get(&self, id: TransferId) -> Result<TransferAggregate>;

    /// Replace a stored aggregate
    ///
    /// Succeeds only if the stored version equals `expected_version`; the
    /// stored copy gets version `expected_version + 1` and is returned.
    async fn save(
        &self,
        aggregate: TransferAggregate,
        expected_version: u64,
    ) -> Result<TransferAggregate>;

    /// All aggregates, oldest first
    async fn list(&self) -> Result<Vec<TransferAggregate>>;
}
