//! Core types for the ledger
//!
//! Money is always `Decimal`; identifiers are newtypes so an account can
//! never be passed where a transaction id is expected.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Wallet or bank account identifier as known to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    /// Indonesian Rupiah
    IDR,
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Singapore Dollar
    SGD,
    /// Malaysian Ringgit
    MYR,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
    /// Japanese Yen
    JPY,
    /// Australian Dollar
    AUD,
}

impl Currency {
    /// All supported currencies
    pub const ALL: [Currency; 10] = [
        Currency::IDR,
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::SGD,
        Currency::MYR,
        Currency::AED,
        Currency::INR,
        Currency::JPY,
        Currency::AUD,
    ];

    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::IDR => "IDR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::SGD => "SGD",
            Currency::MYR => "MYR",
            Currency::AED => "AED",
            Currency::INR => "INR",
            Currency::JPY => "JPY",
            Currency::AUD => "AUD",
        }
    }

    /// Number of minor units (decimal places) used for amounts
    pub fn minor_units(&self) -> u32 {
        match self {
            Currency::IDR | Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Round an amount to this currency's minor units (half away from zero)
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_units(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl FromStr for Currency {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code() == upper)
            .ok_or_else(|| crate::Error::UnknownCurrency(s.to_string()))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Key of a single balance cell. Ordering defines the global lock order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// Account
    pub account: AccountId,
    /// Currency of the wallet
    pub currency: Currency,
}

impl BalanceKey {
    /// Create new balance key
    pub fn new(account: AccountId, currency: Currency) -> Self {
        Self { account, currency }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.currency)
    }
}

/// Ledger transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerTransactionId(Uuid);

impl LedgerTransactionId {
    /// Generate a new time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LedgerTransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LedgerTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerTransactionStatus {
    /// Recorded but not applied
    Pending,
    /// Both legs applied
    Completed,
    /// Reversed by a compensating posting
    Cancelled,
}

/// Request to post a transaction
///
/// `from_account = None` models external funding: money arriving from
/// outside the ledger, so only the credit leg is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    /// Debited account (None for external funding)
    pub from_account: Option<AccountId>,
    /// Credited account
    pub to_account: AccountId,
    /// Currency of the debit leg
    pub currency: Currency,
    /// Currency of the credit leg
    pub converted_currency: Currency,
    /// Debit amount
    pub amount: Decimal,
    /// Credit amount
    pub converted_amount: Decimal,
    /// Fee recorded against the transaction (informational)
    pub fee: Decimal,
    /// Free-form caller reference (transfer id, step number)
    pub reference: String,
}

/// A posted ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Transaction ID
    pub id: LedgerTransactionId,
    /// Debited account (None for external funding)
    pub from_account: Option<AccountId>,
    /// Credited account
    pub to_account: AccountId,
    /// Currency of the debit leg
    pub currency: Currency,
    /// Currency of the credit leg
    pub converted_currency: Currency,
    /// Debit amount
    pub amount: Decimal,
    /// Credit amount
    pub converted_amount: Decimal,
    /// Fee
    pub fee: Decimal,
    /// Status
    pub status: LedgerTransactionStatus,
    /// Caller reference
    pub reference: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Completion timestamp
    pub completed_at: Option<DateTime<Utc>>,
    /// Cancellation timestamp
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl LedgerTransaction {
    /// Signed balance adjustments this transaction applies
    pub fn legs(&self) -> Vec<(BalanceKey, Decimal)> {
        let mut legs = Vec::with_capacity(2);
        if let Some(from) = &self.from_account {
            legs.push((BalanceKey::new(from.clone(), self.currency), -self.amount));
        }
        legs.push((
            BalanceKey::new(self.to_account.clone(), self.converted_currency),
            self.converted_amount,
        ));
        legs
    }

    /// Signed adjustments that undo this transaction
    pub fn reversal_legs(&self) -> Vec<(BalanceKey, Decimal)> {
        self.legs()
            .into_iter()
            .map(|(key, delta)| (key, -delta))
            .collect()
    }
}
