//! In-memory rate oracle and account directory
//!
//! Used by the demo binary and as test fixtures. The oracle can be switched
//! to fail or to stall so fallback and timeout paths are reachable.

use crate::{Account, AccountDirectory, Card, Error, RateOracle, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use ledger_core::{AccountId, Currency};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::time::Duration;

/// How the in-memory oracle answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    /// Answer from the table
    Healthy,
    /// Fail every call
    Failing,
    /// Sleep this long before answering
    Stalled(Duration),
}

/// Rate oracle backed by a fixed table
#[derive(Debug)]
pub struct StaticRateOracle {
    rates: DashMap<(Currency, Currency), Decimal>,
    mode: RwLock<OracleMode>,
}

impl StaticRateOracle {
    /// Create an oracle with no rates
    pub fn new() -> Self {
        Self {
            rates: DashMap::new(),
            mode: RwLock::new(OracleMode::Healthy),
        }
    }

    /// Add a rate
    pub fn with_rate(self, source: Currency, target: Currency, rate: Decimal) -> Self {
        self.set_rate(source, target, rate);
        self
    }

    /// Add or replace a rate
    pub fn set_rate(&self, source: Currency, target: Currency, rate: Decimal) {
        self.rates.insert((source, target), rate);
    }

    /// Change answering mode
    pub fn set_mode(&self, mode: OracleMode) {
        *self.mode.write() = mode;
    }
}

impl Default for StaticRateOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateOracle for StaticRateOracle {
    async fn get_rate(&self, source: Currency, target: Currency) -> Result<Decimal> {
        let mode = *self.mode.read();
        match mode {
            OracleMode::Healthy => {}
            OracleMode::Failing => {
                return Err(Error::UpstreamUnavailable(
                    "rate oracle is failing".to_string(),
                ))
            }
            OracleMode::Stalled(delay) => tokio::time::sleep(delay).await,
        }

        self.rates
            .get(&(source, target))
            .map(|rate| *rate)
            .ok_or_else(|| {
                Error::UpstreamUnavailable(format!("no rate for {}/{}", source, target))
            })
    }
}

/// Directory backed by in-memory maps
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    // Map: (provider, currency) -> account
    accounts: DashMap<(String, Currency), Account>,
    cards: DashMap<String, Card>,
}

impl InMemoryAccountDirectory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, replacing any for the same provider and currency
    pub fn add_account(
        &self,
        provider: impl Into<String>,
        currency: Currency,
        id: impl Into<String>,
        active: bool,
    ) -> AccountId {
        let provider = provider.into();
        let account = Account {
            id: AccountId::new(id),
            provider: provider.clone(),
            currency,
            active,
        };
        let id = account.id.clone();
        self.accounts.insert((provider, currency), account);
        id
    }

    /// Register a card
    pub fn add_card(&self, card: Card) {
        self.cards.insert(card.card_ref.clone(), card);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_active_account(&self, provider: &str, currency: Currency) -> Result<Account> {
        self.accounts
            .get(&(provider.to_string(), currency))
            .filter(|entry| entry.active)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no active {} account at provider {}",
                    currency, provider
                ))
            })
    }

    async fn find_card(&self, card_ref: &str) -> Result<Card> {
        self.cards
            .get(card_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("card {}", card_ref)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_oracle_modes() {
        let oracle = StaticRateOracle::new().with_rate(Currency::IDR, Currency::EUR, dec!(0.000058));
        assert_eq!(
            oracle.get_rate(Currency::IDR, Currency::EUR).await.unwrap(),
            dec!(0.000058)
        );
        assert!(oracle.get_rate(Currency::EUR, Currency::IDR).await.is_err());

        oracle.set_mode(OracleMode::Failing);
        assert!(oracle.get_rate(Currency::IDR, Currency::EUR).await.is_err());
    }

    #[tokio::test]
    async fn test_directory_hides_inactive_accounts() {
        let directory = InMemoryAccountDirectory::new();
        directory.add_account("wallet-eu", Currency::EUR, "eu-1", true);
        directory.add_account("wallet-old", Currency::EUR, "old-1", false);

        let account = directory
            .find_active_account("wallet-eu", Currency::EUR)
            .await
            .unwrap();
        assert_eq!(account.id, AccountId::new("eu-1"));

        assert!(directory
            .find_active_account("wallet-old", Currency::EUR)
            .await
            .is_err());
        assert!(directory
            .find_active_account("wallet-eu", Currency::USD)
            .await
            .is_err());
        assert!(directory.find_card("missing").await.is_err());
    }
}
