//! In-memory transfer repository

use crate::{Error, Result, TransferAggregate, TransferId, TransferRepository};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Transfer repository backed by a `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryTransferRepository {
    transfers: DashMap<TransferId, TransferAggregate>,
}

impl InMemoryTransferRepository {
    /// Create empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transfers
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

#[async_trait]
impl TransferRepository for InMemoryTransferRepository {
    async fn insert(&self, aggregate: TransferAggregate) -> Result<TransferAggregate> {
        match self.transfers.entry(aggregate.id) {
            Entry::Occupied(existing) => Err(Error::Conflict {
                id: aggregate.id,
                expected: 0,
                actual: existing.get().version,
            }),
            Entry::Vacant(slot) => {
                slot.insert(aggregate.clone());
                Ok(aggregate)
            }
        }
    }

    async fn get(&self, id: TransferId) -> Result<TransferAggregate> {
        self.transfers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("transfer {}", id)))
    }

    async fn save(
        &self,
        mut aggregate: TransferAggregate,
        expected_version: u64,
    ) -> Result<TransferAggregate> {
        let id = aggregate.id;
        let mut stored = self
            .transfers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("transfer {}", id)))?;

        if stored.version != expected_version {
            return Err(Error::Conflict {
                id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        aggregate.version = expected_version + 1;
        aggregate.updated_at = Utc::now();
        *stored = aggregate.clone();
        Ok(aggregate)
    }

    async fn list(&self) -> Result<Vec<TransferAggregate>> {
        let mut all: Vec<_> = self
            .transfers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransferRequest, TransferStatus};
    use ledger_core::Currency;
    use rust_decimal_macros::dec;

    fn aggregate() -> TransferAggregate {
        let now = Utc::now();
        TransferAggregate {
            id: TransferId::new(),
            request: TransferRequest {
                source_amount: dec!(100),
                source_currency: Currency::EUR,
                target_currency: Currency::EUR,
                intermediate_provider: "hub".to_string(),
                target_provider: "dest".to_string(),
                source_card: None,
            },
            status: TransferStatus::Pending,
            steps: Vec::new(),
            version: 0,
            halted_for_review: false,
            rate_fallback_used: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let repo = InMemoryTransferRepository::new();
        let transfer = aggregate();

        repo.insert(transfer.clone()).await.unwrap();
        assert!(matches!(
            repo.insert(transfer).await,
            Err(Error::Conflict { .. })
        ));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_save_checks_version() {
        let repo = InMemoryTransferRepository::new();
        let transfer = repo.insert(aggregate()).await.unwrap();

        let saved = repo.save(transfer.clone(), 0).await.unwrap();
        assert_eq!(saved.version, 1);

        // Stale writer still holds version 0
        let stale = repo.save(transfer, 0).await;
        assert!(matches!(
            stale,
            Err(Error::Conflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert_eq!(repo.get(saved.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_get_and_save_unknown() {
        let repo = InMemoryTransferRepository::new();
        assert!(matches!(
            repo.get(TransferId::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            repo.save(aggregate(), 0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_oldest_first() {
        let repo = InMemoryTransferRepository::new();
        let mut older = aggregate();
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = aggregate();

        repo.insert(newer.clone()).await.unwrap();
        repo.insert(older.clone()).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }
}
