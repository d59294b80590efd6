//! Minimum transfer amounts per provider and method
//!
//! The table is immutable once built; the builder validates every entry at
//! load time.

use crate::{Error, Hop, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable `(provider, method) -> minimum` mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinimumAmountTable {
    entries: HashMap<(String, String), Decimal>,
}

impl MinimumAmountTable {
    /// Start building a table
    pub fn builder() -> MinimumAmountTableBuilder {
        MinimumAmountTableBuilder::default()
    }

    /// Minimum for a provider and method, if configured
    pub fn minimum(&self, provider: &str, method: &str) -> Option<Decimal> {
        self.entries
            .get(&(provider.to_string(), method.to_string()))
            .copied()
    }

    /// Whether `amount` meets every hop's configured minimum
    pub fn admits(&self, hops: &[Hop], amount: Decimal) -> bool {
        hops.iter().all(|hop| {
            self.minimum(&hop.provider, &hop.method)
                .map_or(true, |min| amount >= min)
        })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One row of a serialized table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumAmountEntry {
    /// Provider
    pub provider: String,
    /// Method
    pub method: String,
    /// Minimum amount
    pub minimum: Decimal,
}

/// Validating builder for [`MinimumAmountTable`]
#[derive(Debug, Default)]
pub struct MinimumAmountTableBuilder {
    entries: Vec<MinimumAmountEntry>,
}

impl MinimumAmountTableBuilder {
    /// Add an entry
    pub fn entry(
        mut self,
        provider: impl Into<String>,
        method: impl Into<String>,
        minimum: Decimal,
    ) -> Self {
        self.entries.push(MinimumAmountEntry {
            provider: provider.into(),
            method: method.into(),
            minimum,
        });
        self
    }

    /// Add serialized rows
    pub fn entries(mut self, rows: impl IntoIterator<Item = MinimumAmountEntry>) -> Self {
        self.entries.extend(rows);
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<MinimumAmountTable> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for row in self.entries {
            if row.provider.trim().is_empty() || row.method.trim().is_empty() {
                return Err(Error::InvalidMinimums(
                    "provider and method must not be empty".to_string(),
                ));
            }
            if row.minimum < Decimal::ZERO {
                return Err(Error::InvalidMinimums(format!(
                    "negative minimum {} for {}/{}",
                    row.minimum, row.provider, row.method
                )));
            }
            let key = (row.provider, row.method);
            if entries.contains_key(&key) {
                return Err(Error::InvalidMinimums(format!(
                    "duplicate entry for {}/{}",
                    key.0, key.1
                )));
            }
            entries.insert(key, row.minimum);
        }
        Ok(MinimumAmountTable { entries })
    }
}
